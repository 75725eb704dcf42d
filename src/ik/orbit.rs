use super::limb::LimbType;

/// Parameters of the orbit angle search, in radians. `oangle` and
/// `iterations` report what the last search did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSearch {
    /// First angle tried.
    pub init: f32,
    /// Initial step away from `init`.
    pub inc: f32,
    /// Added to the step after each round.
    pub rate: f32,
    pub min: f32,
    pub max: f32,
    pub oangle: f32,
    pub iterations: u32,
}

impl Default for OrbitSearch {
    fn default() -> Self {
        Self::for_limb(LimbType::RightArm)
    }
}

impl OrbitSearch {
    /// Defaults: start at 32°, step 2° growing by 0.1°. Arms search
    /// -15°..130°, legs -30°..90°.
    pub fn for_limb(limb: LimbType) -> Self {
        let (min, max) = if limb.is_arm() { (-15.0f32, 130.0f32) } else { (-30.0, 90.0) };
        let init = 32.0f32.to_radians();
        Self {
            init,
            inc: 2.0f32.to_radians(),
            rate: 0.1f32.to_radians(),
            min: min.to_radians(),
            max: max.to_radians(),
            oangle: init,
            iterations: 0,
        }
    }

    pub fn with_init(mut self, init: f32) -> Self {
        self.init = init;
        self
    }

    pub fn with_inc(mut self, inc: f32) -> Self {
        self.inc = inc;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}
