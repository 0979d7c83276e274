use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

impl FromStr for Location {
    type Err = String;

    /// Parses the `"City, Country"` form used by the location pick-list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (city, country) = s
            .split_once(',')
            .ok_or_else(|| format!("Expected 'City, Country', got '{}'", s))?;
        let (city, country) = (city.trim(), country.trim());
        if city.is_empty() || country.is_empty() {
            return Err(format!("Expected 'City, Country', got '{}'", s));
        }
        Ok(Location {
            city: city.to_string(),
            country: country.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salary {
    pub min: u64,
    pub max: u64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    Internship,
    #[serde(rename = "Full-time")]
    FullTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Remote,
    Onsite,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Entry,
    Junior,
    Mid,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Rejected,
}

/// Implements `as_str`, `Display` and case-insensitive `FromStr` over the
/// display labels, which are also the serialized form.
macro_rules! labelled_enum {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let labels: Vec<&str> = $ty::ALL.iter().map(|v| v.as_str()).collect();
                        format!("Unknown value '{}'. Expected one of: {}", s, labels.join(", "))
                    })
            }
        }
    };
}

labelled_enum!(JobType {
    Internship => "Internship",
    FullTime => "Full-time",
});

labelled_enum!(WorkType {
    Remote => "Remote",
    Onsite => "Onsite",
    Hybrid => "Hybrid",
});

labelled_enum!(ExperienceLevel {
    Entry => "Entry",
    Junior => "Junior",
    Mid => "Mid",
    Senior => "Senior",
});

labelled_enum!(ApplicationStatus {
    Applied => "Applied",
    Interview => "Interview",
    Rejected => "Rejected",
});

/// A job posting from the catalog. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub company_logo: String,
    pub location: Location,
    pub salary: Salary,
    pub job_type: JobType,
    pub work_type: WorkType,
    pub experience_level: ExperienceLevel,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub posted_date: DateTime<Utc>,
    pub application_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A submitted application, as persisted under the `appliedJobs` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub job_id: String,
    pub status: ApplicationStatus,
    pub applied_date: DateTime<Utc>,
    pub personal_details: PersonalDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
}

/// Everything the caller supplies when applying; the store stamps the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDraft {
    pub personal_details: PersonalDetails,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}
