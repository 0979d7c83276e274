use crate::catalog::Catalog;
use crate::models::Job;

pub const DEFAULT_SIMILAR_LIMIT: usize = 3;

/// Other jobs sharing the category or the job type of `job_id`, first matches
/// in catalog order win. Unknown ids yield nothing.
pub fn similar_jobs<'a>(catalog: &'a Catalog, job_id: &str, limit: usize) -> Vec<&'a Job> {
    let Some(current) = catalog.get(job_id) else {
        return Vec::new();
    };

    catalog
        .jobs()
        .iter()
        .filter(|job| {
            job.id != job_id
                && (job.category == current.category || job.job_type == current.job_type)
        })
        .take(limit)
        .collect()
}
