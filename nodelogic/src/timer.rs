//! `TimerNode`: advances a microsecond clock once per update pass, either
//! from the host's own clock or from a caller-supplied ticker.

use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::{PropertyType, PropertyValue};

use crate::error::{EngineError, EngineResult};
use crate::property::{Property, PropertyArena, Semantics};

/// Input `ticker_us`: `0` means "let the host clock drive this timer";
/// any other value is a caller-supplied timestamp that must never go
/// backwards. Outputs `ticker_us` (echoed) and `timeDelta_us`, the gap
/// since the previous tick (`0` on the very first update).
pub struct TimerData {
    pub input_root: PropertyId,
    pub output_root: PropertyId,
    ticker_in: PropertyId,
    ticker_out: PropertyId,
    delta_out: PropertyId,
    last_ticker_us: Option<i64>,
}

impl TimerData {
    pub fn build(arena: &mut PropertyArena, owner: NodeId) -> Self {
        let input_root = Property::build(
            arena,
            owner,
            None,
            "IN",
            PropertyType::Struct(vec![("ticker_us".into(), PropertyType::Int64)]),
            Semantics::ScriptInput,
        );
        let output_root = Property::build(
            arena,
            owner,
            None,
            "OUT",
            PropertyType::Struct(vec![
                ("ticker_us".into(), PropertyType::Int64),
                ("timeDelta_us".into(), PropertyType::Int64),
            ]),
            Semantics::ScriptOutput,
        );
        let ticker_in = arena
            .get(input_root)
            .unwrap()
            .get_child_by_name("ticker_us")
            .unwrap();
        let out = arena.get(output_root).unwrap();
        let ticker_out = out.get_child_by_name("ticker_us").unwrap();
        let delta_out = out.get_child_by_name("timeDelta_us").unwrap();
        Self {
            input_root,
            output_root,
            ticker_in,
            ticker_out,
            delta_out,
            last_ticker_us: None,
        }
    }

    /// Advances the timer. `host_elapsed_us` is the host clock's reading,
    /// used only when the `ticker_us` input is `0`.
    pub fn update(&mut self, arena: &mut PropertyArena, host_elapsed_us: i64) -> EngineResult<()> {
        let requested = match arena.get(self.ticker_in).unwrap().get_value() {
            Some(PropertyValue::Int64(v)) => *v,
            _ => 0,
        };
        if requested < 0 {
            return Err(EngineError::RuntimeError {
                name: "TimerNode".into(),
                node: arena.get(self.input_root).unwrap().owner(),
                message: format!("ticker_us must not be negative: {requested}"),
                stack_trace: String::new(),
            });
        }
        let effective = if requested == 0 { host_elapsed_us } else { requested };

        if let Some(last) = self.last_ticker_us {
            if effective < last {
                return Err(EngineError::RuntimeError {
                    name: "TimerNode".into(),
                    node: arena.get(self.input_root).unwrap().owner(),
                    message: format!(
                        "ticker_us must be monotonically increasing: {effective} < {last}"
                    ),
                    stack_trace: String::new(),
                });
            }
        }
        let delta = self.last_ticker_us.map(|last| effective - last).unwrap_or(0);
        self.last_ticker_us = Some(effective);

        arena
            .get_mut(self.ticker_out)
            .unwrap()
            .script_output_set(PropertyValue::Int64(effective))?;
        arena
            .get_mut(self.delta_out)
            .unwrap()
            .script_output_set(PropertyValue::Int64(delta))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> NodeId {
        NodeId::from_parts(1, 0)
    }

    #[test]
    fn auto_mode_uses_host_clock_and_computes_delta() {
        let mut arena = PropertyArena::new();
        let mut timer = TimerData::build(&mut arena, owner());
        timer.update(&mut arena, 1_000).unwrap();
        assert_eq!(
            arena.get(timer.delta_out).unwrap().get_value(),
            Some(&PropertyValue::Int64(0))
        );
        timer.update(&mut arena, 1_500).unwrap();
        assert_eq!(
            arena.get(timer.delta_out).unwrap().get_value(),
            Some(&PropertyValue::Int64(500))
        );
    }

    #[test]
    fn manual_ticker_must_not_go_backwards() {
        let mut arena = PropertyArena::new();
        let mut timer = TimerData::build(&mut arena, owner());
        arena
            .get_mut(timer.ticker_in)
            .unwrap()
            .manual_set(PropertyValue::Int64(100))
            .unwrap();
        timer.update(&mut arena, 0).unwrap();
        arena
            .get_mut(timer.ticker_in)
            .unwrap()
            .manual_set(PropertyValue::Int64(50))
            .unwrap();
        assert!(timer.update(&mut arena, 0).is_err());
    }

    #[test]
    fn negative_ticker_is_rejected_before_the_monotonic_check() {
        let mut arena = PropertyArena::new();
        let mut timer = TimerData::build(&mut arena, owner());
        arena
            .get_mut(timer.ticker_in)
            .unwrap()
            .manual_set(PropertyValue::Int64(-1))
            .unwrap();
        assert!(timer.update(&mut arena, 0).is_err());
    }
}
