use serde::{Deserialize, Serialize};

/// A debate topic. Supplied by an external motion provider; the core treats
/// it as opaque input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motion {
    pub id: String,
    pub topic: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: MotionKind,
}

/// How the motion is argued: a free opinion, or a for/against stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionKind {
    Opinion,
    Stance,
}

/// Which side the speaker takes on a stance-type motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    For,
    Against,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::For => "for",
            Stance::Against => "against",
        }
    }
}
