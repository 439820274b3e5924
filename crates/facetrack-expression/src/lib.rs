//! Normalization and unified-schema mapping.
//!
//! Decoded channel values pass through exactly two pure steps:
//! 1. [`normalize`] applies the eyelid/gaze correction
//! 2. [`ExpressionMapper::map`] builds the consumer-facing
//!    [`UnifiedExpressionFrame`] from a declarative [`SchemaVersion`] table

pub mod mapping;
pub mod normalize;
pub mod unified;

pub use mapping::{
    ExpressionMapper, SchemaVersion, ShapeMapping, ShapeSource, UnknownSchema, LIP_FUNNELERS,
    LIP_SHAPE_V2, UNMAPPED_SHAPES,
};
pub use normalize::{normalize, NormalizedFrame};
pub use unified::{
    EyeBrow, LipShapes, UnifiedEye, UnifiedEyeData, UnifiedExpressionFrame, UnifiedShape,
    Vector2, DEFAULT_PUPIL_DIAMETER, DEFAULT_PUPIL_DILATION, SHAPE_COUNT,
};
