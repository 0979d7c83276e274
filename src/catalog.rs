use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::models::{Job, Location};

const BUNDLED_JOBS: &str = include_str!("../data/jobs.json");

/// The read-only set of job postings, in stable catalog order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

impl Catalog {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_JOBS).context("Bundled job catalog is invalid")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid catalog file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let jobs: Vec<Job> = serde_json::from_str(content).context("Failed to parse job catalog")?;
        Self::new(jobs)
    }

    pub fn new(jobs: Vec<Job>) -> Result<Self> {
        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.id.as_str()) {
                return Err(anyhow!("Duplicate job id '{}' in catalog", job.id));
            }
            if job.salary.min > job.salary.max {
                return Err(anyhow!(
                    "Job '{}' has salary min {} above max {}",
                    job.id,
                    job.salary.min,
                    job.salary.max
                ));
            }
        }
        Ok(Self { jobs })
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Linear scan; absence is a normal outcome, not an error.
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Distinct locations in first-seen order.
    pub fn cities(&self) -> Vec<Location> {
        let mut out: Vec<Location> = Vec::new();
        for job in &self.jobs {
            if !out.contains(&job.location) {
                out.push(job.location.clone());
            }
        }
        out
    }

    /// Distinct categories with the number of postings in each, first-seen order.
    pub fn categories(&self) -> Vec<CategoryCount> {
        let mut out: Vec<CategoryCount> = Vec::new();
        for job in &self.jobs {
            match out.iter_mut().find(|c| c.name == job.category) {
                Some(entry) => entry.count += 1,
                None => out.push(CategoryCount {
                    name: job.category.clone(),
                    count: 1,
                }),
            }
        }
        out
    }
}

#[cfg(test)]
pub(crate) fn test_job(
    id: &str,
    category: &str,
    job_type: crate::models::JobType,
) -> Job {
    use crate::models::{ExperienceLevel, Salary, WorkType};

    Job {
        id: id.to_string(),
        title: format!("Job {}", id),
        company: "Acme".to_string(),
        company_logo: "/logos/acme.png".to_string(),
        location: Location {
            city: "Berlin".to_string(),
            country: "Germany".to_string(),
        },
        salary: Salary {
            min: 50000,
            max: 90000,
            currency: "EUR".to_string(),
        },
        job_type,
        work_type: WorkType::Remote,
        experience_level: ExperienceLevel::Mid,
        category: category.to_string(),
        description: String::new(),
        responsibilities: Vec::new(),
        requirements: Vec::new(),
        skills: Vec::new(),
        benefits: Vec::new(),
        posted_date: "2026-09-01T09:00:00Z".parse().unwrap(),
        application_deadline: "2026-11-01T09:00:00Z".parse().unwrap(),
    }
}
