//! `AnimationNode`: samples a set of named keyframe channels at a single
//! `progress` input and exposes one output per channel, linearly
//! interpolated between the two bracketing keyframes.

use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::{PropertyType, PropertyValue};

use crate::error::{EngineError, EngineResult};
use crate::property::{Property, PropertyArena, Semantics};

/// A single channel's keyframes, sorted by ascending time. `progress`
/// values outside `[times.first(), times.last()]` clamp to the nearest
/// endpoint rather than extrapolating.
pub struct ChannelDef {
    pub name: String,
    pub keyframes: Vec<(f32, PropertyValue)>,
}

pub struct AnimationData {
    pub input_root: PropertyId,
    pub output_root: PropertyId,
    progress_in: PropertyId,
    channels: Vec<(Vec<(f32, PropertyValue)>, PropertyId)>,
}

impl AnimationData {
    pub fn build(
        arena: &mut PropertyArena,
        owner: NodeId,
        channels: Vec<ChannelDef>,
    ) -> EngineResult<Self> {
        for channel in &channels {
            if channel.keyframes.is_empty() {
                return Err(EngineError::InterfaceError {
                    name: channel.name.clone(),
                    message: "animation channel needs at least one keyframe".into(),
                });
            }
        }

        let input_root = Property::build(
            arena,
            owner,
            None,
            "IN",
            PropertyType::Struct(vec![("progress".into(), PropertyType::Float)]),
            Semantics::ScriptInput,
        );
        let progress_in = arena
            .get(input_root)
            .unwrap()
            .get_child_by_name("progress")
            .unwrap();

        let output_fields: Vec<_> = channels
            .iter()
            .map(|c| (c.name.as_str().into(), c.keyframes[0].1.type_of()))
            .collect();
        let output_root = Property::build(
            arena,
            owner,
            None,
            "OUT",
            PropertyType::Struct(output_fields),
            Semantics::ScriptOutput,
        );

        let out = arena.get(output_root).unwrap();
        let channels = channels
            .into_iter()
            .map(|c| {
                let id = out.get_child_by_name(&c.name).unwrap();
                (c.keyframes, id)
            })
            .collect();

        Ok(Self {
            input_root,
            output_root,
            progress_in,
            channels,
        })
    }

    /// `(channel name, keyframes)` for every channel, read from the
    /// output property names this animation was built with.
    pub fn channel_defs<'a>(
        &'a self,
        arena: &'a PropertyArena,
    ) -> impl Iterator<Item = (&'a str, &'a [(f32, PropertyValue)])> {
        self.channels
            .iter()
            .map(move |(keyframes, out_id)| (arena.get(*out_id).unwrap().name(), keyframes.as_slice()))
    }

    pub fn update(&mut self, arena: &mut PropertyArena) -> EngineResult<()> {
        let progress = match arena.get(self.progress_in).unwrap().get_value() {
            Some(PropertyValue::Float(v)) => *v,
            _ => 0.0,
        };
        for (keyframes, out_id) in &self.channels {
            let value = sample(keyframes, progress);
            arena.get_mut(*out_id).unwrap().script_output_set(value)?;
        }
        Ok(())
    }
}

fn sample(keyframes: &[(f32, PropertyValue)], progress: f32) -> PropertyValue {
    if progress <= keyframes[0].0 {
        return keyframes[0].1.clone();
    }
    if let Some(last) = keyframes.last() {
        if progress >= last.0 {
            return last.1.clone();
        }
    }
    for window in keyframes.windows(2) {
        let (t0, v0) = &window[0];
        let (t1, v1) = &window[1];
        if progress >= *t0 && progress <= *t1 {
            let span = (*t1 - *t0).max(f32::EPSILON);
            let t = (progress - t0) / span;
            return lerp(v0, v1, t);
        }
    }
    keyframes[0].1.clone()
}

fn lerp(a: &PropertyValue, b: &PropertyValue, t: f32) -> PropertyValue {
    match (a, b) {
        (PropertyValue::Float(a), PropertyValue::Float(b)) => {
            PropertyValue::Float(a + (b - a) * t)
        }
        (PropertyValue::Vec2f(a), PropertyValue::Vec2f(b)) => {
            PropertyValue::Vec2f(a.lerp(*b, t))
        }
        (PropertyValue::Vec3f(a), PropertyValue::Vec3f(b)) => {
            PropertyValue::Vec3f(a.lerp(*b, t))
        }
        (PropertyValue::Vec4f(a), PropertyValue::Vec4f(b)) => {
            PropertyValue::Vec4f(a.lerp(*b, t))
        }
        // Non-interpolable leaf types (Int32/Int64/Bool/String/integer
        // vectors) step at the midpoint instead of blending.
        _ => {
            if t < 0.5 {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> NodeId {
        NodeId::from_parts(1, 0)
    }

    #[test]
    fn linear_interpolation_between_two_keyframes() {
        let mut arena = PropertyArena::new();
        let mut anim = AnimationData::build(
            &mut arena,
            owner(),
            vec![ChannelDef {
                name: "x".into(),
                keyframes: vec![(0.0, PropertyValue::Float(0.0)), (1.0, PropertyValue::Float(10.0))],
            }],
        )
        .unwrap();
        arena
            .get_mut(anim.progress_in)
            .unwrap()
            .manual_set(PropertyValue::Float(0.5))
            .unwrap();
        anim.update(&mut arena).unwrap();
        let out = arena.get(anim.output_root).unwrap();
        let x = out.get_child_by_name("x").unwrap();
        assert_eq!(arena.get(x).unwrap().get_value(), Some(&PropertyValue::Float(5.0)));
    }

    #[test]
    fn progress_outside_range_clamps() {
        let mut arena = PropertyArena::new();
        let mut anim = AnimationData::build(
            &mut arena,
            owner(),
            vec![ChannelDef {
                name: "x".into(),
                keyframes: vec![(0.0, PropertyValue::Float(0.0)), (1.0, PropertyValue::Float(10.0))],
            }],
        )
        .unwrap();
        arena
            .get_mut(anim.progress_in)
            .unwrap()
            .manual_set(PropertyValue::Float(5.0))
            .unwrap();
        anim.update(&mut arena).unwrap();
        let out = arena.get(anim.output_root).unwrap();
        let x = out.get_child_by_name("x").unwrap();
        assert_eq!(arena.get(x).unwrap().get_value(), Some(&PropertyValue::Float(10.0)));
    }
}
