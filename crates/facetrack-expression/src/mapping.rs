//! Declarative mapping from normalized channels to the unified schema.

use std::fmt;
use std::str::FromStr;

use facetrack_frame::Channel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::NormalizedFrame;
use crate::unified::{
    EyeBrow, LipShapes, UnifiedEye, UnifiedEyeData, UnifiedExpressionFrame, UnifiedShape, Vector2,
};

/// Where a unified shape reads its intensity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeSource {
    /// Direct read of one channel.
    Channel(Channel),
    /// Arithmetic mean of a symmetric pair.
    Mean(Channel, Channel),
}

impl ShapeSource {
    pub fn resolve(self, frame: &NormalizedFrame) -> f32 {
        match self {
            ShapeSource::Channel(channel) => frame[channel],
            ShapeSource::Mean(a, b) => (frame[a] + frame[b]) / 2.0,
        }
    }
}

/// One row of a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeMapping {
    pub shape: UnifiedShape,
    pub source: ShapeSource,
}

const fn direct(shape: UnifiedShape, channel: Channel) -> ShapeMapping {
    ShapeMapping {
        shape,
        source: ShapeSource::Channel(channel),
    }
}

const fn pair(shape: UnifiedShape, a: Channel, b: Channel) -> ShapeMapping {
    ShapeMapping {
        shape,
        source: ShapeSource::Mean(a, b),
    }
}

/// Legacy lip table.
pub const LIP_SHAPE_V2: &[ShapeMapping] = &[
    direct(UnifiedShape::CheekPuffLeft, Channel::CheekPuffL),
    direct(UnifiedShape::CheekPuffRight, Channel::CheekPuffR),
    pair(UnifiedShape::CheekSuck, Channel::CheekSuckL, Channel::CheekSuckR),
    direct(UnifiedShape::JawOpen, Channel::JawDrop),
    direct(UnifiedShape::JawLeft, Channel::MouthLeft),
    direct(UnifiedShape::JawRight, Channel::MouthRight),
    direct(UnifiedShape::JawForward, Channel::JawThrust),
    pair(UnifiedShape::MouthPout, Channel::LipPuckerL, Channel::LipPuckerR),
    direct(UnifiedShape::MouthUpperLeft, Channel::MouthLeft),
    direct(UnifiedShape::MouthLowerLeft, Channel::MouthLeft),
    direct(UnifiedShape::MouthUpperRight, Channel::MouthRight),
    direct(UnifiedShape::MouthLowerRight, Channel::MouthRight),
    direct(UnifiedShape::MouthSmileLeft, Channel::LipCornerPullerL),
    direct(UnifiedShape::MouthSmileRight, Channel::LipCornerPullerR),
    direct(UnifiedShape::MouthSadLeft, Channel::LipCornerDepressorL),
    direct(UnifiedShape::MouthSadRight, Channel::LipCornerDepressorR),
    direct(UnifiedShape::MouthUpperOverturn, Channel::LipsToward),
    direct(UnifiedShape::MouthLowerOverturn, Channel::LipsToward),
    direct(UnifiedShape::MouthUpperUpLeft, Channel::UpperLipRaiserL),
    direct(UnifiedShape::MouthUpperUpRight, Channel::UpperLipRaiserR),
];

/// Rows the unified-expressions schema adds on top of [`LIP_SHAPE_V2`].
pub const LIP_FUNNELERS: &[ShapeMapping] = &[
    direct(UnifiedShape::LipFunnelerLB, Channel::LipFunnelerLB),
    direct(UnifiedShape::LipFunnelerRB, Channel::LipFunnelerRB),
    direct(UnifiedShape::LipFunnelerLT, Channel::LipFunnelerLT),
    direct(UnifiedShape::LipFunnelerRT, Channel::LipFunnelerRT),
];

/// Shapes no channel feeds. They stay at zero.
pub const UNMAPPED_SHAPES: &[UnifiedShape] = &[
    UnifiedShape::MouthLowerOverlay,
    UnifiedShape::MouthUpperInside,
    UnifiedShape::MouthLowerInside,
    UnifiedShape::MouthLowerDownLeft,
    UnifiedShape::MouthLowerDownRight,
];

/// Which lip table the mapper uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaVersion {
    LipShapeV2,
    #[default]
    UnifiedExpressions,
}

impl SchemaVersion {
    /// Tables applied in order; later schemas extend earlier ones.
    pub fn tables(self) -> &'static [&'static [ShapeMapping]] {
        match self {
            SchemaVersion::LipShapeV2 => &[LIP_SHAPE_V2],
            SchemaVersion::UnifiedExpressions => &[LIP_SHAPE_V2, LIP_FUNNELERS],
        }
    }

    /// Every mapping row of this schema.
    pub fn rows(self) -> impl Iterator<Item = &'static ShapeMapping> {
        self.tables().iter().flat_map(|table| table.iter())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::LipShapeV2 => "lip-shape-v2",
            SchemaVersion::UnifiedExpressions => "unified-expressions",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown schema version {0:?} (expected lip-shape-v2 or unified-expressions)")]
pub struct UnknownSchema(pub String);

impl FromStr for SchemaVersion {
    type Err = UnknownSchema;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lip-shape-v2" | "v2" => Ok(SchemaVersion::LipShapeV2),
            "unified-expressions" | "unified" => Ok(SchemaVersion::UnifiedExpressions),
            _ => Err(UnknownSchema(s.to_string())),
        }
    }
}

struct EyeChannels {
    look_left: Channel,
    look_right: Channel,
    look_up: Channel,
    look_down: Channel,
    closed: Channel,
    lid_tightener: Channel,
    upper_lid_raiser: Channel,
    inner_brow_raiser: Channel,
    outer_brow_raiser: Channel,
    brow_lowerer: Channel,
}

const LEFT_EYE: EyeChannels = EyeChannels {
    look_left: Channel::EyesLookLeftL,
    look_right: Channel::EyesLookRightL,
    look_up: Channel::EyesLookUpL,
    look_down: Channel::EyesLookDownL,
    closed: Channel::EyesClosedL,
    lid_tightener: Channel::LidTightenerL,
    upper_lid_raiser: Channel::UpperLidRaiserL,
    inner_brow_raiser: Channel::InnerBrowRaiserL,
    outer_brow_raiser: Channel::OuterBrowRaiserL,
    brow_lowerer: Channel::BrowLowererL,
};

const RIGHT_EYE: EyeChannels = EyeChannels {
    look_left: Channel::EyesLookLeftR,
    look_right: Channel::EyesLookRightR,
    look_up: Channel::EyesLookUpR,
    look_down: Channel::EyesLookDownR,
    closed: Channel::EyesClosedR,
    lid_tightener: Channel::LidTightenerR,
    upper_lid_raiser: Channel::UpperLidRaiserR,
    inner_brow_raiser: Channel::InnerBrowRaiserR,
    outer_brow_raiser: Channel::OuterBrowRaiserR,
    brow_lowerer: Channel::BrowLowererR,
};

fn map_eye(frame: &NormalizedFrame, eye: &EyeChannels) -> UnifiedEye {
    let tightener = frame[eye.lid_tightener];
    let lowerer = frame[eye.brow_lowerer];
    UnifiedEye {
        gaze: Vector2::new(
            frame[eye.look_right] - frame[eye.look_left],
            frame[eye.look_up] - frame[eye.look_down],
        ),
        openness: frame[eye.closed],
        squeeze: tightener,
        squint: tightener,
        widen: frame[eye.upper_lid_raiser],
        brow: EyeBrow {
            inner_up: frame[eye.inner_brow_raiser],
            inner_down: lowerer,
            outer_up: frame[eye.outer_brow_raiser],
            outer_down: lowerer,
        },
    }
}

/// Builds unified frames from normalized ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpressionMapper {
    schema: SchemaVersion,
}

impl ExpressionMapper {
    pub fn new(schema: SchemaVersion) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn map(&self, frame: &NormalizedFrame) -> UnifiedExpressionFrame {
        let mut out = UnifiedExpressionFrame::default();
        self.map_into(frame, &mut out);
        out
    }

    /// Overwrite every field of `out` from `frame`.
    pub fn map_into(&self, frame: &NormalizedFrame, out: &mut UnifiedExpressionFrame) {
        let left = map_eye(frame, &LEFT_EYE);
        let right = map_eye(frame, &RIGHT_EYE);
        out.eyes = UnifiedEyeData {
            left,
            right,
            combined: UnifiedEye::mean(&left, &right),
            ..UnifiedEyeData::default()
        };

        out.shapes = LipShapes::default();
        for row in self.schema.rows() {
            out.shapes.set(row.shape, row.source.resolve(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::unified::{DEFAULT_PUPIL_DIAMETER, DEFAULT_PUPIL_DILATION};
    use facetrack_frame::{ChannelValues, CHANNEL_COUNT};

    fn pseudo_random_values(seed: u32) -> ChannelValues {
        let mut state = seed;
        let mut values = [0.0f32; CHANNEL_COUNT];
        for v in values.iter_mut() {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *v = (state >> 8) as f32 / (1u32 << 24) as f32;
        }
        ChannelValues::from_array(values)
    }

    #[test]
    fn zero_frame_maps_to_open_centered_eyes_and_silent_mouth() {
        let frame = ExpressionMapper::default().map(&normalize(ChannelValues::zeroed()));

        for eye in [frame.eyes.left, frame.eyes.right, frame.eyes.combined] {
            assert_eq!(eye.openness, 0.9);
            assert_eq!(eye.gaze, Vector2::new(0.0, 0.0));
        }
        assert!(frame.shapes.iter().all(|(_, v)| v == 0.0));
        assert_eq!(frame.eyes.pupil_dilation, DEFAULT_PUPIL_DILATION);
        assert_eq!(frame.eyes.pupil_diameter, DEFAULT_PUPIL_DIAMETER);
    }

    #[test]
    fn eye_fields_follow_channel_rules() {
        let mut v = ChannelValues::zeroed();
        v[Channel::EyesLookRightL] = 0.75;
        v[Channel::EyesLookLeftL] = 0.25;
        v[Channel::EyesLookUpR] = 0.5;
        v[Channel::InnerBrowRaiserL] = 0.25;
        v[Channel::OuterBrowRaiserR] = 0.5;
        v[Channel::BrowLowererL] = 0.75;
        v[Channel::UpperLidRaiserR] = 0.75;

        let frame = ExpressionMapper::default().map(&normalize(v));
        let left = frame.eyes.left;
        let right = frame.eyes.right;

        assert_eq!(left.gaze, Vector2::new(0.5, 0.0));
        assert_eq!(right.gaze, Vector2::new(0.0, 0.5));
        assert_eq!(left.brow.inner_up, 0.25);
        assert_eq!(right.brow.outer_up, 0.5);
        assert_eq!(left.brow.inner_down, 0.75);
        assert_eq!(left.brow.outer_down, 0.75);
        assert_eq!(right.widen, 0.25);
        assert_eq!(left.squeeze, left.squint);
    }

    #[test]
    fn combined_eye_is_mean_of_left_and_right() {
        for seed in [1, 7, 42, 9001] {
            let frame = ExpressionMapper::default().map(&normalize(pseudo_random_values(seed)));
            let expected = UnifiedEye::mean(&frame.eyes.left, &frame.eyes.right);
            assert_eq!(frame.eyes.combined, expected);
            assert_eq!(
                frame.eyes.combined.openness,
                (frame.eyes.left.openness + frame.eyes.right.openness) / 2.0
            );
        }
    }

    #[test]
    fn shared_channels_feed_several_shapes() {
        let mut v = ChannelValues::zeroed();
        v[Channel::MouthLeft] = 0.5;
        v[Channel::LipsToward] = 0.25;
        v[Channel::CheekSuckL] = 1.0;
        v[Channel::LipPuckerR] = 0.5;

        let shapes = ExpressionMapper::default().map(&normalize(v)).shapes;

        assert_eq!(shapes.get(UnifiedShape::JawLeft), 0.5);
        assert_eq!(shapes.get(UnifiedShape::MouthUpperLeft), 0.5);
        assert_eq!(shapes.get(UnifiedShape::MouthLowerLeft), 0.5);
        assert_eq!(shapes.get(UnifiedShape::MouthUpperOverturn), 0.25);
        assert_eq!(shapes.get(UnifiedShape::MouthLowerOverturn), 0.25);
        assert_eq!(shapes.get(UnifiedShape::CheekSuck), 0.5);
        assert_eq!(shapes.get(UnifiedShape::MouthPout), 0.25);
    }

    #[test]
    fn legacy_schema_leaves_funnelers_at_zero() {
        let mut v = ChannelValues::zeroed();
        v[Channel::LipFunnelerLT] = 0.5;
        let normalized = normalize(v);

        let legacy = ExpressionMapper::new(SchemaVersion::LipShapeV2).map(&normalized);
        let unified = ExpressionMapper::new(SchemaVersion::UnifiedExpressions).map(&normalized);

        assert_eq!(legacy.shapes.get(UnifiedShape::LipFunnelerLT), 0.0);
        assert_eq!(unified.shapes.get(UnifiedShape::LipFunnelerLT), 0.5);
    }

    #[test]
    fn tables_do_not_touch_unmapped_shapes() {
        assert_eq!(SchemaVersion::LipShapeV2.rows().count(), 20);
        assert_eq!(SchemaVersion::UnifiedExpressions.rows().count(), 24);
        for row in SchemaVersion::UnifiedExpressions.rows() {
            assert!(!UNMAPPED_SHAPES.contains(&row.shape), "{} is mapped", row.shape);
        }
        let covered = SchemaVersion::UnifiedExpressions.rows().count() + UNMAPPED_SHAPES.len();
        assert_eq!(covered, UnifiedShape::ALL.len());
    }

    #[test]
    fn unified_schema_extends_legacy_rows() {
        let legacy: Vec<_> = SchemaVersion::LipShapeV2.rows().collect();
        let unified: Vec<_> = SchemaVersion::UnifiedExpressions.rows().collect();

        assert_eq!(&unified[..legacy.len()], &legacy[..]);
        assert_eq!(
            unified[legacy.len()..].iter().map(|row| row.shape).collect::<Vec<_>>(),
            LIP_FUNNELERS.iter().map(|row| row.shape).collect::<Vec<_>>()
        );
    }

    #[test]
    fn map_into_overwrites_previous_frame() {
        let mapper = ExpressionMapper::default();
        let mut out = UnifiedExpressionFrame::default();

        let mut v = ChannelValues::zeroed();
        v[Channel::JawDrop] = 0.5;
        mapper.map_into(&normalize(v), &mut out);
        assert_eq!(out.shapes.get(UnifiedShape::JawOpen), 0.5);

        mapper.map_into(&normalize(ChannelValues::zeroed()), &mut out);
        assert_eq!(out.shapes.get(UnifiedShape::JawOpen), 0.0);
    }

    #[test]
    fn schema_parses_and_serializes_kebab_case() {
        assert_eq!("lip-shape-v2".parse::<SchemaVersion>(), Ok(SchemaVersion::LipShapeV2));
        assert_eq!("Unified".parse::<SchemaVersion>(), Ok(SchemaVersion::UnifiedExpressions));
        assert!("v3".parse::<SchemaVersion>().is_err());

        let json = serde_json::to_string(&SchemaVersion::LipShapeV2).unwrap();
        assert_eq!(json, "\"lip-shape-v2\"");
        let back: SchemaVersion = serde_json::from_str("\"unified-expressions\"").unwrap();
        assert_eq!(back, SchemaVersion::UnifiedExpressions);
    }
}
