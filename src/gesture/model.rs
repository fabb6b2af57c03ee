use std::collections::BTreeMap;

use crate::foundation::core::Point;

/// The six tracked upper-body joints of the stick-figure avatar.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Joint {
    /// Left shoulder.
    LeftShoulder,
    /// Left elbow.
    LeftElbow,
    /// Left wrist.
    LeftWrist,
    /// Right shoulder.
    RightShoulder,
    /// Right elbow.
    RightElbow,
    /// Right wrist.
    RightWrist,
}

impl Joint {
    /// Every known joint, in canonical order.
    pub const ALL: [Joint; 6] = [
        Joint::LeftShoulder,
        Joint::LeftElbow,
        Joint::LeftWrist,
        Joint::RightShoulder,
        Joint::RightElbow,
        Joint::RightWrist,
    ];

    /// Name used in definition files.
    pub fn name(self) -> &'static str {
        match self {
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::LeftElbow => "LEFT_ELBOW",
            Self::LeftWrist => "LEFT_WRIST",
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::RightElbow => "RIGHT_ELBOW",
            Self::RightWrist => "RIGHT_WRIST",
        }
    }

    /// Parse a definition-file joint name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|j| j.name() == upper)
    }

    /// Rest position used whenever a pose leaves this joint undefined.
    pub fn default_position(self) -> Point {
        match self {
            Self::LeftShoulder => Point::new(0.45, 0.5),
            Self::LeftElbow => Point::new(0.45, 0.45),
            Self::LeftWrist => Point::new(0.45, 0.4),
            Self::RightShoulder => Point::new(0.55, 0.5),
            Self::RightElbow => Point::new(0.55, 0.45),
            Self::RightWrist => Point::new(0.55, 0.4),
        }
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Partial or complete mapping from joint to normalized 2D coordinate.
///
/// Serialized as `{"RIGHT_WRIST": [x, y], ...}`, the same shape gesture files use.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "BTreeMap<Joint, [f64; 2]>", into = "BTreeMap<Joint, [f64; 2]>")]
pub struct Pose {
    joints: BTreeMap<Joint, Point>,
}

impl Pose {
    /// An empty pose (every joint undefined).
    pub fn new() -> Self {
        Self::default()
    }

    /// The rest pose with all six joints defined.
    pub fn rest() -> Self {
        Joint::ALL
            .into_iter()
            .map(|j| (j, j.default_position()))
            .collect()
    }

    /// Coordinate for `joint`, if defined.
    pub fn get(&self, joint: Joint) -> Option<Point> {
        self.joints.get(&joint).copied()
    }

    /// Coordinate for `joint`, falling back to its rest position.
    pub fn get_or_default(&self, joint: Joint) -> Point {
        self.get(joint).unwrap_or_else(|| joint.default_position())
    }

    /// Define or overwrite a joint.
    pub fn set(&mut self, joint: Joint, at: Point) {
        self.joints.insert(joint, at);
    }

    /// Builder form of [`Pose::set`].
    pub fn with(mut self, joint: Joint, at: Point) -> Self {
        self.set(joint, at);
        self
    }

    /// Defined joints in canonical order.
    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.joints.keys().copied()
    }

    /// `(joint, coordinate)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Joint, Point)> + '_ {
        self.joints.iter().map(|(j, p)| (*j, *p))
    }

    /// Number of defined joints.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether no joint is defined.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Whether all six joints are defined.
    pub fn is_complete(&self) -> bool {
        self.joints.len() == Joint::ALL.len()
    }

    /// Copy with every undefined joint filled from the rest pose.
    pub fn filled(&self) -> Self {
        let mut out = self.clone();
        for joint in Joint::ALL {
            out.joints
                .entry(joint)
                .or_insert_with(|| joint.default_position());
        }
        out
    }
}

impl FromIterator<(Joint, Point)> for Pose {
    fn from_iter<I: IntoIterator<Item = (Joint, Point)>>(iter: I) -> Self {
        Self {
            joints: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<Joint, [f64; 2]>> for Pose {
    fn from(raw: BTreeMap<Joint, [f64; 2]>) -> Self {
        raw.into_iter()
            .map(|(j, [x, y])| (j, Point::new(x, y)))
            .collect()
    }
}

impl From<Pose> for BTreeMap<Joint, [f64; 2]> {
    fn from(pose: Pose) -> Self {
        pose.joints
            .into_iter()
            .map(|(j, p)| (j, [p.x, p.y]))
            .collect()
    }
}

/// Timestamped partial pose used as an interpolation anchor.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    /// Normalized time in `[0, 1]`.
    pub time: f64,
    /// Joints pinned at this time.
    pub pose: Pose,
}

/// Free-form descriptive metadata carried through from the definition store.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GestureMeta {
    /// Human-readable description.
    pub description: Option<String>,
    /// Grouping label such as "greeting".
    pub category: Option<String>,
    /// Search tags.
    pub tags: Vec<String>,
}

/// A validated keyframed pose animation, keyed by its uppercase name.
#[derive(Clone, Debug, PartialEq)]
pub struct Gesture {
    /// Uppercase unique name.
    pub name: String,
    /// Authored reference frame count (>= 1).
    pub frames: u32,
    /// Keyframes sorted ascending by time; never empty.
    pub keyframes: Vec<Keyframe>,
    /// Descriptive metadata.
    pub meta: GestureMeta,
}

/// Raw, unvalidated gesture record as stored on disk.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GestureDef {
    /// Gesture name; case is normalized on load.
    pub name: String,
    /// Authored reference frame count.
    pub frames: u32,
    /// Keyframes in any order.
    pub keyframes: Vec<KeyframeDef>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional category.
    #[serde(default)]
    pub category: Option<String>,
    /// Optional tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Raw keyframe; joint names are plain strings so unknown names survive parsing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct KeyframeDef {
    /// Normalized time.
    pub time: f64,
    /// Joint name to `[x, y]`.
    pub pose: BTreeMap<String, [f64; 2]>,
}

#[cfg(test)]
#[path = "../../tests/unit/gesture/model.rs"]
mod tests;
