//! Lip sync: playback energy to mouth parameter deltas
//!
//! Each tick's RMS is turned into additive deltas for the model's mouth
//! channels. Every channel is evaluated on its own; a vowel channel outside
//! its RMS band gets a zero delta for that tick.

use crate::engine::{ParameterInfo, RenderEngine};

/// Gain applied to "form" (mouth width/shape) channels
pub const FORM_GAIN: f32 = 0.5;

/// Parameter ids assumed when the model exposes no mouth channel at all
pub const FALLBACK_MOUTH_CHANNELS: [&str; 2] = ["ParamMouthOpenY", "PARAM_MOUTH_OPEN_Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vowel {
    A,
    I,
    U,
    E,
    O,
}

impl Vowel {
    pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::I, Vowel::U, Vowel::E, Vowel::O];

    pub fn from_parameter_id(id: &str) -> Option<Self> {
        match id {
            "ParamA" => Some(Vowel::A),
            "ParamI" => Some(Vowel::I),
            "ParamU" => Some(Vowel::U),
            "ParamE" => Some(Vowel::E),
            "ParamO" => Some(Vowel::O),
            _ => None,
        }
    }

    /// Exclusive RMS band `(low, high)` in which this vowel is active
    pub fn band(self) -> (f32, f32) {
        match self {
            Vowel::A => (0.05, f32::INFINITY),
            Vowel::O => (0.04, 0.15),
            Vowel::I => (f32::NEG_INFINITY, 0.06),
            Vowel::U => (0.03, 0.10),
            Vowel::E => (0.03, 0.08),
        }
    }

    pub fn gain(self) -> f32 {
        match self {
            Vowel::A => 3.0,
            Vowel::O => 2.0,
            Vowel::I => 1.0,
            Vowel::U => 1.5,
            Vowel::E => 1.0,
        }
    }

    pub fn delta(self, rms: f32) -> f32 {
        let (low, high) = self.band();
        if rms > low && rms < high {
            rms * self.gain()
        } else {
            0.0
        }
    }
}

/// The model's parameters, sorted by what lip sync does with them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMap {
    /// Every id containing "mouth" (case-insensitive)
    pub mouth: Vec<String>,
    pub vowels: Vec<(String, Vowel)>,
    /// Cheek, tongue and jaw channels; listed for diagnostics, not driven
    pub special: Vec<String>,
}

impl ChannelMap {
    pub fn classify(parameters: &[ParameterInfo]) -> Self {
        let mut map = ChannelMap::default();
        for param in parameters {
            let lower = param.id.to_lowercase();
            if lower.contains("mouth") {
                log::info!(
                    "mouth parameter: {} (min: {}, max: {})",
                    param.id,
                    param.min,
                    param.max
                );
                map.mouth.push(param.id.clone());
            } else if let Some(vowel) = Vowel::from_parameter_id(&param.id) {
                log::info!(
                    "vowel parameter: {} (min: {}, max: {})",
                    param.id,
                    param.min,
                    param.max
                );
                map.vowels.push((param.id.clone(), vowel));
            } else if lower.contains("cheek") || lower.contains("tongue") || lower.contains("jaw") {
                log::info!(
                    "special parameter: {} (min: {}, max: {})",
                    param.id,
                    param.min,
                    param.max
                );
                map.special.push(param.id.clone());
            }
        }

        if map.mouth.is_empty() {
            log::warn!(
                "no mouth parameters found, falling back to {:?}",
                FALLBACK_MOUTH_CHANNELS
            );
            map.mouth = FALLBACK_MOUTH_CHANNELS.iter().map(|s| s.to_string()).collect();
        }
        map
    }
}

/// One additive write for the current tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDelta<'a> {
    pub id: &'a str,
    pub value: f32,
}

pub struct LipSyncMapper {
    channels: ChannelMap,
    multiplier: f32,
}

impl LipSyncMapper {
    pub fn new(channels: ChannelMap, multiplier: f32) -> Self {
        Self {
            channels,
            multiplier,
        }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Deltas for one tick at energy `rms`
    ///
    /// Mouth channels with "openy" in their id open by `rms * multiplier`,
    /// those with "form" widen by `rms * 0.5`, other mouth channels are left
    /// alone. Every vowel channel gets an entry, zero outside its band.
    pub fn deltas(&self, rms: f32) -> Vec<ParameterDelta<'_>> {
        let rms = if rms.is_finite() { rms.max(0.0) } else { 0.0 };
        let mut out = Vec::with_capacity(self.channels.mouth.len() + self.channels.vowels.len());

        for id in &self.channels.mouth {
            let lower = id.to_lowercase();
            if lower.contains("openy") || lower.contains("open_y") {
                out.push(ParameterDelta {
                    id,
                    value: rms * self.multiplier,
                });
            } else if lower.contains("form") {
                out.push(ParameterDelta {
                    id,
                    value: rms * FORM_GAIN,
                });
            }
        }

        for (id, vowel) in &self.channels.vowels {
            out.push(ParameterDelta {
                id,
                value: vowel.delta(rms),
            });
        }
        out
    }

    /// Write this tick's deltas into `engine`
    ///
    /// Channels the engine rejects are skipped. Returns how many writes were
    /// accepted.
    pub fn apply(&self, rms: f32, engine: &mut dyn RenderEngine) -> usize {
        log::trace!("rms {:.4}", rms);
        let mut accepted = 0;
        for delta in self.deltas(rms) {
            match engine.add_parameter_delta(delta.id, delta.value) {
                Ok(()) => accepted += 1,
                Err(e) => log::debug!("lip sync write to {} dropped: {}", delta.id, e),
            }
        }
        accepted
    }
}
