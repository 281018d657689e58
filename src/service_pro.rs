//! Service pros: the technicians routes are planned for.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::time_window::TimeWindow;

/// Source-system service pro id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceProId(pub i64);

impl ServiceProId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ServiceProId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named capability a pro can hold and an appointment can require.
///
/// Every pro also carries a personal skill (`personal:{pro_id}`). Putting
/// that skill on an appointment pins it to the one pro holding it, which
/// is how preferred-pro requests and double-booking prevention are
/// expressed to the routing engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill(String);

impl Skill {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn personal(pro_id: ServiceProId) -> Self {
        Self(format!("personal:{}", pro_id.value()))
    }

    pub fn is_personal(&self) -> bool {
        self.0.starts_with("personal:")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A technician together with everything planning needs to know about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePro {
    pub id: ServiceProId,
    pub name: String,
    /// Where the day starts, usually the pro's home.
    pub start_location: Option<Coordinate>,
    /// Where the day ends; often the same as the start.
    pub end_location: Option<Coordinate>,
    /// Availability on the plan date; `None` means off that day.
    pub working_hours: Option<TimeWindow>,
    /// Employee id in the HR system, when linked.
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
    skills: Vec<Skill>,
}

impl ServicePro {
    /// Creates a pro with their personal skill already in place.
    pub fn new(id: ServiceProId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            start_location: None,
            end_location: None,
            working_hours: None,
            external_id: None,
            avatar_url: None,
            skills: vec![Skill::personal(id)],
        }
    }

    pub fn with_home(mut self, location: Coordinate) -> Self {
        self.start_location = Some(location);
        self.end_location = Some(location);
        self
    }

    pub fn with_start_location(mut self, location: Coordinate) -> Self {
        self.start_location = Some(location);
        self
    }

    pub fn with_end_location(mut self, location: Coordinate) -> Self {
        self.end_location = Some(location);
        self
    }

    pub fn with_working_hours(mut self, window: TimeWindow) -> Self {
        self.working_hours = Some(window);
        self
    }

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = Skill>) -> Self {
        for skill in skills {
            self.add_skill(skill);
        }
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    /// Appends a skill unless the pro already holds it. Skills are never
    /// removed once granted.
    pub fn add_skill(&mut self, skill: Skill) {
        if !self.skills.contains(&skill) {
            self.skills.push(skill);
        }
    }

    pub fn personal_skill(&self) -> Skill {
        Skill::personal(self.id)
    }

    pub fn has_skill(&self, skill: &Skill) -> bool {
        self.skills.contains(skill)
    }

    /// Whether the pro holds every skill in `required`.
    pub fn has_skills(&self, required: &[Skill]) -> bool {
        required.iter().all(|skill| self.has_skill(skill))
    }

    /// Whether the pro holds any non-personal skill. A pro without one
    /// serves no general customers and contributes no capacity.
    pub fn has_service_skills(&self) -> bool {
        self.skills.iter().any(|skill| !skill.is_personal())
    }
}
