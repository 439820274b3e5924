//! The consumer-facing unified expression schema.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Pupil dilation reported when the source carries no pupil data.
pub const DEFAULT_PUPIL_DILATION: f32 = 0.5;

/// Pupil diameter (meters) reported when the source carries no pupil data.
pub const DEFAULT_PUPIL_DIAMETER: f32 = 0.0035;

/// Number of lip shapes in the unified schema.
pub const SHAPE_COUNT: usize = 29;

/// Two-dimensional gaze direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn mean(a: Self, b: Self) -> Self {
        Self {
            x: mean(a.x, b.x),
            y: mean(a.y, b.y),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EyeBrow {
    pub inner_up: f32,
    pub inner_down: f32,
    pub outer_up: f32,
    pub outer_down: f32,
}

/// One eye record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnifiedEye {
    pub gaze: Vector2,
    pub openness: f32,
    pub squeeze: f32,
    pub squint: f32,
    pub widen: f32,
    pub brow: EyeBrow,
}

impl UnifiedEye {
    /// Field-wise arithmetic mean of two eyes.
    pub fn mean(a: &Self, b: &Self) -> Self {
        Self {
            gaze: Vector2::mean(a.gaze, b.gaze),
            openness: mean(a.openness, b.openness),
            squeeze: mean(a.squeeze, b.squeeze),
            squint: mean(a.squint, b.squint),
            widen: mean(a.widen, b.widen),
            brow: EyeBrow {
                inner_up: mean(a.brow.inner_up, b.brow.inner_up),
                inner_down: mean(a.brow.inner_down, b.brow.inner_down),
                outer_up: mean(a.brow.outer_up, b.brow.outer_up),
                outer_down: mean(a.brow.outer_down, b.brow.outer_down),
            },
        }
    }
}

fn mean(a: f32, b: f32) -> f32 {
    (a + b) / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnifiedEyeData {
    pub left: UnifiedEye,
    pub right: UnifiedEye,
    pub combined: UnifiedEye,
    pub pupil_dilation: f32,
    pub pupil_diameter: f32,
}

impl Default for UnifiedEyeData {
    fn default() -> Self {
        Self {
            left: UnifiedEye::default(),
            right: UnifiedEye::default(),
            combined: UnifiedEye::default(),
            pupil_dilation: DEFAULT_PUPIL_DILATION,
            pupil_diameter: DEFAULT_PUPIL_DIAMETER,
        }
    }
}

macro_rules! shape_table {
    ($($variant:ident),+ $(,)?) => {
        /// A lip/jaw/cheek shape of the unified schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum UnifiedShape {
            $($variant,)+
        }

        impl UnifiedShape {
            pub const ALL: [UnifiedShape; SHAPE_COUNT] = [$(UnifiedShape::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(UnifiedShape::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

shape_table! {
    CheekPuffLeft,
    CheekPuffRight,
    CheekSuck,
    JawOpen,
    JawLeft,
    JawRight,
    JawForward,
    MouthPout,
    MouthUpperLeft,
    MouthLowerLeft,
    MouthUpperRight,
    MouthLowerRight,
    MouthSmileLeft,
    MouthSmileRight,
    MouthSadLeft,
    MouthSadRight,
    MouthUpperOverturn,
    MouthLowerOverturn,
    MouthUpperUpLeft,
    MouthUpperUpRight,
    MouthLowerDownLeft,
    MouthLowerDownRight,
    MouthUpperInside,
    MouthLowerInside,
    MouthLowerOverlay,
    LipFunnelerLB,
    LipFunnelerRB,
    LipFunnelerLT,
    LipFunnelerRT,
}

impl UnifiedShape {
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UnifiedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Intensity per unified shape. Values are nominally in `[0, 1]` but not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LipShapes {
    values: [f32; SHAPE_COUNT],
}

impl LipShapes {
    pub fn get(&self, shape: UnifiedShape) -> f32 {
        self.values[shape.index()]
    }

    pub fn set(&mut self, shape: UnifiedShape, value: f32) {
        self.values[shape.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnifiedShape, f32)> + '_ {
        UnifiedShape::ALL
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

impl Default for LipShapes {
    fn default() -> Self {
        Self {
            values: [0.0; SHAPE_COUNT],
        }
    }
}

impl Serialize for LipShapes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(SHAPE_COUNT))?;
        for (shape, value) in self.iter() {
            map.serialize_entry(shape.name(), &value)?;
        }
        map.end()
    }
}

/// Everything the pipeline publishes for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnifiedExpressionFrame {
    pub eyes: UnifiedEyeData,
    pub shapes: LipShapes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_indices_follow_declaration_order() {
        for (i, shape) in UnifiedShape::ALL.iter().enumerate() {
            assert_eq!(shape.index(), i);
        }
        assert_eq!(UnifiedShape::LipFunnelerRT.name(), "LipFunnelerRT");
    }

    #[test]
    fn default_frame_has_pupil_placeholders() {
        let frame = UnifiedExpressionFrame::default();
        assert_eq!(frame.eyes.pupil_dilation, DEFAULT_PUPIL_DILATION);
        assert_eq!(frame.eyes.pupil_diameter, DEFAULT_PUPIL_DIAMETER);
        assert!(frame.shapes.iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn eye_mean_is_field_wise() {
        let a = UnifiedEye {
            gaze: Vector2::new(1.0, -1.0),
            openness: 0.25,
            brow: EyeBrow {
                inner_up: 1.0,
                ..EyeBrow::default()
            },
            ..UnifiedEye::default()
        };
        let b = UnifiedEye {
            gaze: Vector2::new(0.0, 1.0),
            openness: 0.75,
            ..UnifiedEye::default()
        };
        let m = UnifiedEye::mean(&a, &b);
        assert_eq!(m.gaze, Vector2::new(0.5, 0.0));
        assert_eq!(m.openness, 0.5);
        assert_eq!(m.brow.inner_up, 0.5);
    }

    #[test]
    fn shapes_serialize_as_named_map() {
        let mut shapes = LipShapes::default();
        shapes.set(UnifiedShape::JawOpen, 0.5);
        let json = serde_json::to_value(shapes).expect("shapes should serialize");

        assert_eq!(json["JawOpen"], 0.5);
        assert_eq!(json.as_object().map(|m| m.len()), Some(SHAPE_COUNT));
    }
}
