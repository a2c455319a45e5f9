//! Triangle LFO evaluated from absolute time.

/// Triangle wave value in [-1, 1] at `now`.
///
/// Returns 0 before `start`. The wave starts at 0 rising, peaks at a quarter
/// period and bottoms out at three quarters.
#[inline]
pub fn triangle(start: f64, frequency: f64, now: f64) -> f64 {
    if now < start || frequency <= 0.0 {
        return 0.0;
    }
    let phase = ((now - start) * frequency).fract();
    if phase < 0.25 {
        phase * 4.0
    } else if phase < 0.75 {
        2.0 - phase * 4.0
    } else {
        phase * 4.0 - 4.0
    }
}

/// Channel-wide vibrato set through GS NRPNs, on top of the SoundFont LFOs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelVibrato {
    /// Depth in cents
    pub depth: f64,
    /// Rate in Hz
    pub rate: f64,
    /// Delay after note-on in seconds
    pub delay: f64,
}

impl ChannelVibrato {
    /// Applied when an NRPN touches vibrato while all three are unset.
    pub const GS_DEFAULT: ChannelVibrato = ChannelVibrato {
        depth: 50.0,
        rate: 8.0,
        delay: 0.6,
    };

    #[inline]
    pub fn is_unset(&self) -> bool {
        self.depth == 0.0 && self.rate == 0.0 && self.delay == 0.0
    }

    /// Pitch offset in cents for a voice started at `start`.
    #[inline]
    pub fn cents(&self, start: f64, now: f64) -> f64 {
        if self.depth <= 0.0 {
            return 0.0;
        }
        triangle(start + self.delay, self.rate, now) * self.depth
    }
}
