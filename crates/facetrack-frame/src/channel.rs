//! The channel table.
//!
//! Positions are fixed by the companion protocol: channel `i` occupies bytes
//! `4 * i .. 4 * i + 4` of every frame. The order is alphabetical by the
//! companion's expression names, so left/right pairs are always adjacent.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Number of channels in every frame.
pub const CHANNEL_COUNT: usize = 63;

macro_rules! channel_table {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// One named slot of the telemetry frame.
        ///
        /// The discriminant is the channel's position in the frame.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Channel {
            $($variant,)+
        }

        impl Channel {
            /// All channels in wire order.
            pub const ALL: [Channel; CHANNEL_COUNT] = [$(Channel::$variant,)+];

            /// Wire name of the channel as the companion reports it.
            pub fn name(self) -> &'static str {
                match self {
                    $(Channel::$variant => $name,)+
                }
            }
        }
    };
}

channel_table! {
    BrowLowererL => "BROW_LOWERER_L",
    BrowLowererR => "BROW_LOWERER_R",
    CheekPuffL => "CHEEK_PUFF_L",
    CheekPuffR => "CHEEK_PUFF_R",
    CheekRaiserL => "CHEEK_RAISER_L",
    CheekRaiserR => "CHEEK_RAISER_R",
    CheekSuckL => "CHEEK_SUCK_L",
    CheekSuckR => "CHEEK_SUCK_R",
    ChinRaiserB => "CHIN_RAISER_B",
    ChinRaiserT => "CHIN_RAISER_T",
    DimplerL => "DIMPLER_L",
    DimplerR => "DIMPLER_R",
    EyesClosedL => "EYES_CLOSED_L",
    EyesClosedR => "EYES_CLOSED_R",
    EyesLookDownL => "EYES_LOOK_DOWN_L",
    EyesLookDownR => "EYES_LOOK_DOWN_R",
    EyesLookLeftL => "EYES_LOOK_LEFT_L",
    EyesLookLeftR => "EYES_LOOK_LEFT_R",
    EyesLookRightL => "EYES_LOOK_RIGHT_L",
    EyesLookRightR => "EYES_LOOK_RIGHT_R",
    EyesLookUpL => "EYES_LOOK_UP_L",
    EyesLookUpR => "EYES_LOOK_UP_R",
    InnerBrowRaiserL => "INNER_BROW_RAISER_L",
    InnerBrowRaiserR => "INNER_BROW_RAISER_R",
    JawDrop => "JAW_DROP",
    JawSidewaysLeft => "JAW_SIDEWAYS_LEFT",
    JawSidewaysRight => "JAW_SIDEWAYS_RIGHT",
    JawThrust => "JAW_THRUST",
    LidTightenerL => "LID_TIGHTENER_L",
    LidTightenerR => "LID_TIGHTENER_R",
    LipCornerDepressorL => "LIP_CORNER_DEPRESSOR_L",
    LipCornerDepressorR => "LIP_CORNER_DEPRESSOR_R",
    LipCornerPullerL => "LIP_CORNER_PULLER_L",
    LipCornerPullerR => "LIP_CORNER_PULLER_R",
    LipFunnelerLB => "LIP_FUNNELER_LB",
    LipFunnelerLT => "LIP_FUNNELER_LT",
    LipFunnelerRB => "LIP_FUNNELER_RB",
    LipFunnelerRT => "LIP_FUNNELER_RT",
    LipPressorL => "LIP_PRESSOR_L",
    LipPressorR => "LIP_PRESSOR_R",
    LipPuckerL => "LIP_PUCKER_L",
    LipPuckerR => "LIP_PUCKER_R",
    LipStretcherL => "LIP_STRETCHER_L",
    LipStretcherR => "LIP_STRETCHER_R",
    LipSuckLB => "LIP_SUCK_LB",
    LipSuckLT => "LIP_SUCK_LT",
    LipSuckRB => "LIP_SUCK_RB",
    LipSuckRT => "LIP_SUCK_RT",
    LipTightenerL => "LIP_TIGHTENER_L",
    LipTightenerR => "LIP_TIGHTENER_R",
    LipsToward => "LIPS_TOWARD",
    LowerLipDepressorL => "LOWER_LIP_DEPRESSOR_L",
    LowerLipDepressorR => "LOWER_LIP_DEPRESSOR_R",
    MouthLeft => "MOUTH_LEFT",
    MouthRight => "MOUTH_RIGHT",
    NoseWrinklerL => "NOSE_WRINKLER_L",
    NoseWrinklerR => "NOSE_WRINKLER_R",
    OuterBrowRaiserL => "OUTER_BROW_RAISER_L",
    OuterBrowRaiserR => "OUTER_BROW_RAISER_R",
    UpperLidRaiserL => "UPPER_LID_RAISER_L",
    UpperLidRaiserR => "UPPER_LID_RAISER_R",
    UpperLipRaiserL => "UPPER_LIP_RAISER_L",
    UpperLipRaiserR => "UPPER_LIP_RAISER_R",
}

impl Channel {
    /// Position of the channel in the frame.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Byte offset of the channel's value within a raw frame.
    pub fn byte_offset(self) -> usize {
        self.index() * 4
    }

    /// Look up a channel by its position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = FrameError;

    /// Accepts the wire name in any ASCII case (`EYES_CLOSED_L`, `eyes_closed_l`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|channel| channel.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FrameError::UnknownChannel(wanted.to_string()))
    }
}
