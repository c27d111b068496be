/// Playback-speed multiplier standing in for a distinct voice.
///
/// The model is single-speaker, so roles are told apart by tempo: a faster
/// teacher reads as a higher register, a slower student as a lower one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    pub speed_multiplier: f32,
}

const PROFILES: &[(&str, VoiceProfile)] = &[
    (
        "teacher",
        VoiceProfile {
            speed_multiplier: 1.15,
        },
    ),
    (
        "student",
        VoiceProfile {
            speed_multiplier: 0.85,
        },
    ),
];

impl VoiceProfile {
    pub const DEFAULT: VoiceProfile = VoiceProfile {
        speed_multiplier: 1.0,
    };

    /// Look up a normalized (lowercase) role; unknown roles get the default.
    pub fn for_role(role: &str) -> Self {
        PROFILES
            .iter()
            .find(|(name, _)| *name == role)
            .map(|(_, profile)| *profile)
            .unwrap_or(Self::DEFAULT)
    }

    /// True when no speed transform should be applied.
    pub fn is_neutral(&self) -> bool {
        self.speed_multiplier == 1.0
    }
}
