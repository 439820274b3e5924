//! Eyelid/gaze correction.
//!
//! The companion couples its eyelid channels to downward gaze. Per side, in
//! this exact order:
//!
//! ```text
//! lid_tightener    = eyes_closed + min(look_down_L, look_down_R)
//! eyes_closed      = 0.9 - lid_tightener * 3
//! upper_lid_raiser = max(0, upper_lid_raiser - 0.5)
//! lid_tightener    = max(0, lid_tightener - 0.5)
//! ```
//!
//! The transform is not idempotent. Run it exactly once per frame.

use std::ops::Index;

use facetrack_frame::{Channel, ChannelValues};

const CLOSED_BASELINE: f32 = 0.9;
const CLOSED_GAIN: f32 = 3.0;
const LID_OFFSET: f32 = 0.5;

/// Channel values after [`normalize`]. Only `normalize` constructs one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFrame {
    values: ChannelValues,
}

impl NormalizedFrame {
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel]
    }

    pub fn values(&self) -> &ChannelValues {
        &self.values
    }

    /// Strip the normalized marker. Feeding the result back into
    /// [`normalize`] applies the correction a second time.
    pub fn into_inner(self) -> ChannelValues {
        self.values
    }
}

impl Index<Channel> for NormalizedFrame {
    type Output = f32;

    fn index(&self, channel: Channel) -> &f32 {
        &self.values[channel]
    }
}

struct LidChannels {
    closed: Channel,
    tightener: Channel,
    upper_lid_raiser: Channel,
}

const LEFT: LidChannels = LidChannels {
    closed: Channel::EyesClosedL,
    tightener: Channel::LidTightenerL,
    upper_lid_raiser: Channel::UpperLidRaiserL,
};

const RIGHT: LidChannels = LidChannels {
    closed: Channel::EyesClosedR,
    tightener: Channel::LidTightenerR,
    upper_lid_raiser: Channel::UpperLidRaiserR,
};

/// Apply the eyelid/gaze correction.
pub fn normalize(mut values: ChannelValues) -> NormalizedFrame {
    let look_down = values[Channel::EyesLookDownL].min(values[Channel::EyesLookDownR]);

    // Both tighteners come from the original closed values.
    let tightener_l = values[LEFT.closed] + look_down;
    let tightener_r = values[RIGHT.closed] + look_down;

    for (side, tightener) in [(&LEFT, tightener_l), (&RIGHT, tightener_r)] {
        values[side.closed] = CLOSED_BASELINE - tightener * CLOSED_GAIN;
        values[side.upper_lid_raiser] = (values[side.upper_lid_raiser] - LID_OFFSET).max(0.0);
        values[side.tightener] = (tightener - LID_OFFSET).max(0.0);
    }

    NormalizedFrame { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn zero_frame_opens_eyes_to_baseline() {
        let n = normalize(ChannelValues::zeroed());
        assert_eq!(n[Channel::EyesClosedL], 0.9);
        assert_eq!(n[Channel::EyesClosedR], 0.9);
        assert_eq!(n[Channel::LidTightenerL], 0.0);
        assert_eq!(n[Channel::UpperLidRaiserR], 0.0);
    }

    #[test]
    fn tightener_uses_smaller_look_down_and_original_closed() {
        let mut v = ChannelValues::zeroed();
        v[Channel::EyesClosedL] = 0.25;
        v[Channel::EyesClosedR] = 0.5;
        v[Channel::EyesLookDownL] = 0.5;
        v[Channel::EyesLookDownR] = 0.25;
        v[Channel::LidTightenerL] = 0.99;
        v[Channel::UpperLidRaiserL] = 0.75;
        v[Channel::UpperLidRaiserR] = 0.25;

        let n = normalize(v);

        // tightener_L = 0.25 + 0.25 = 0.5, tightener_R = 0.5 + 0.25 = 0.75
        assert!(approx(n[Channel::EyesClosedL], 0.9 - 1.5));
        assert!(approx(n[Channel::EyesClosedR], 0.9 - 2.25));
        assert_eq!(n[Channel::LidTightenerL], 0.0);
        assert_eq!(n[Channel::LidTightenerR], 0.25);
        assert_eq!(n[Channel::UpperLidRaiserL], 0.25);
        assert_eq!(n[Channel::UpperLidRaiserR], 0.0);
        // Gaze channels themselves are untouched.
        assert_eq!(n[Channel::EyesLookDownL], 0.5);
    }

    #[test]
    fn deterministic_bit_for_bit() {
        let mut v = ChannelValues::zeroed();
        for (i, channel) in Channel::ALL.iter().enumerate() {
            v[*channel] = (i as f32 * 0.37).sin();
        }
        let a = normalize(v);
        let b = normalize(v);
        for channel in Channel::ALL {
            assert_eq!(a[channel].to_bits(), b[channel].to_bits());
        }
    }

    #[test]
    fn double_normalization_differs() {
        let once = normalize(ChannelValues::zeroed());
        let twice = normalize(once.into_inner());

        assert_ne!(once, twice);
        // Second pass: tightener = 0.9, closed = 0.9 - 2.7, tightener -> 0.4.
        assert!(approx(twice[Channel::EyesClosedL], -1.8));
        assert!(approx(twice[Channel::LidTightenerL], 0.4));
        assert!(approx(twice[Channel::LidTightenerR], 0.4));
    }
}
