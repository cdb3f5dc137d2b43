use serde::{Deserialize, Serialize};
use std::fmt;

/// Head pose the user is asked to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pose {
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl Pose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pose::Center => "center",
            Pose::Left => "left",
            Pose::Right => "right",
            Pose::Up => "up",
            Pose::Down => "down",
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed pose prompt of the guided sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub pose: Pose,
    pub prompt: String,
    pub duration_ms: u64,
}

impl Instruction {
    pub fn new(pose: Pose, prompt: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            pose,
            prompt: prompt.into(),
            duration_ms,
        }
    }
}

/// The stock head-movement sequence. The last entry is the completion prompt.
pub fn default_instructions() -> Vec<Instruction> {
    vec![
        Instruction::new(Pose::Center, "Look straight ahead", 1000),
        Instruction::new(Pose::Left, "Turn your head left", 800),
        Instruction::new(Pose::Center, "Look straight ahead", 800),
        Instruction::new(Pose::Right, "Turn your head right", 800),
        Instruction::new(Pose::Center, "Look straight ahead", 800),
        Instruction::new(Pose::Up, "Look up", 800),
        Instruction::new(Pose::Down, "Look down", 800),
        Instruction::new(Pose::Center, "Done!", 500),
    ]
}

pub fn total_duration_ms(instructions: &[Instruction]) -> u64 {
    instructions.iter().map(|i| i.duration_ms).sum()
}
