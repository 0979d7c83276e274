use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::models::{ExperienceLevel, Job, JobType, Location, WorkType};

pub const PAGE_SIZE: usize = 6;
pub const DEFAULT_SALARY_MAX: u64 = 200_000;
/// Sentinel meaning "no restriction" for the location and job type overrides.
pub const ANY: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalaryRange {
    pub min: u64,
    pub max: u64,
}

impl Default for SalaryRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_SALARY_MAX,
        }
    }
}

impl SalaryRange {
    /// A job matches only if its whole band lies inside the range. A band that
    /// merely overlaps is excluded.
    pub fn contains(&self, job: &Job) -> bool {
        job.salary.min >= self.min && job.salary.max <= self.max
    }
}

/// Structured constraints from the filter panel. Empty sets and `None`
/// mean no restriction; the default value is the reset state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub job_types: Vec<JobType>,
    pub work_types: Vec<WorkType>,
    pub location: Option<Location>,
    pub salary: SalaryRange,
    pub experience_levels: Vec<ExperienceLevel>,
}

/// Free-text constraints carried over from a search or a category pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOverrides {
    pub keyword: Option<String>,
    /// `"City, Country"`, or `"all"`.
    pub location: Option<String>,
    /// A job type label, or `"all"`.
    pub job_type: Option<String>,
    pub category: Option<String>,
}

/// Narrows `jobs` by every active constraint, preserving input order.
pub fn filter_jobs<'a>(
    jobs: &'a [Job],
    criteria: &FilterCriteria,
    overrides: &SearchOverrides,
) -> Vec<&'a Job> {
    let mut filtered: Vec<&Job> = jobs.iter().collect();

    if !criteria.job_types.is_empty() {
        filtered.retain(|job| criteria.job_types.contains(&job.job_type));
    }

    if !criteria.work_types.is_empty() {
        filtered.retain(|job| criteria.work_types.contains(&job.work_type));
    }

    if let Some(location) = &criteria.location {
        filtered.retain(|job| job.location == *location);
    }

    if !criteria.experience_levels.is_empty() {
        filtered.retain(|job| criteria.experience_levels.contains(&job.experience_level));
    }

    filtered.retain(|job| criteria.salary.contains(job));

    if let Some(keyword) = overrides.keyword.as_deref().filter(|k| !k.is_empty()) {
        let keyword = keyword.to_lowercase();
        filtered.retain(|job| {
            job.title.to_lowercase().contains(&keyword)
                || job.company.to_lowercase().contains(&keyword)
        });
    }

    if let Some(location) = overrides.location.as_deref().filter(|l| *l != ANY) {
        filtered.retain(|job| job.location.to_string() == location);
    }

    if let Some(job_type) = overrides.job_type.as_deref().filter(|t| *t != ANY) {
        filtered.retain(|job| job.job_type.as_str() == job_type);
    }

    if let Some(category) = &overrides.category {
        filtered.retain(|job| job.category == *category);
    }

    filtered
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page<'a, T> {
    /// 1-based.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: &'a [T],
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Slices out one page. Out-of-range page numbers clamp to the nearest page.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let total = total_pages(items.len(), page_size);
    let number = page.clamp(1, total.max(1));
    let start = ((number - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());
    Page {
        number,
        total_pages: total,
        total_items: items.len(),
        items: &items[start..end],
    }
}

/// Handed out when a load starts; a newer load or any filter change makes it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// State of the job listing view: filters, results and the current page.
#[derive(Debug, Clone)]
pub struct Listing {
    criteria: FilterCriteria,
    overrides: SearchOverrides,
    page: usize,
    page_size: usize,
    /// Indices into the job list of the current results.
    results: Vec<usize>,
    generation: u64,
    loading: bool,
}

impl Default for Listing {
    fn default() -> Self {
        Self::new()
    }
}

impl Listing {
    pub fn new() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            overrides: SearchOverrides::default(),
            page: 1,
            page_size: PAGE_SIZE,
            results: Vec::new(),
            generation: 0,
            loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.invalidate();
    }

    pub fn set_overrides(&mut self, overrides: SearchOverrides) {
        self.overrides = overrides;
        self.invalidate();
    }

    /// Clears every criterion and override.
    pub fn reset(&mut self) {
        self.criteria = FilterCriteria::default();
        self.overrides = SearchOverrides::default();
        self.invalidate();
    }

    pub fn is_filtered(&self) -> bool {
        self.criteria != FilterCriteria::default() || self.overrides != SearchOverrides::default()
    }

    /// Recomputes results immediately, e.g. after the job list changed.
    pub fn refresh(&mut self, jobs: &[Job]) {
        self.invalidate();
        self.apply(jobs);
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.loading = true;
        LoadTicket(self.generation)
    }

    /// Publishes results for `ticket`. Returns false, leaving state untouched,
    /// if the ticket has been superseded.
    pub fn finish_load(&mut self, ticket: LoadTicket, jobs: &[Job]) -> bool {
        if ticket.0 != self.generation {
            debug!(ticket = ticket.0, current = self.generation, "Discarding stale listing load");
            return false;
        }
        self.apply(jobs);
        self.loading = false;
        true
    }

    /// Simulated fetch: waits `delay` on `clock`, then publishes.
    pub async fn load(&mut self, jobs: &[Job], clock: &dyn Clock, delay: Duration) -> bool {
        let ticket = self.begin_load();
        clock.sleep(delay).await;
        self.finish_load(ticket, jobs)
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    #[cfg(test)]
    pub fn results<'a>(&self, jobs: &'a [Job]) -> Vec<&'a Job> {
        self.results
            .iter()
            .filter_map(|&i| jobs.get(i))
            .collect()
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.results.len(), self.page_size)
    }

    pub fn page_jobs<'a>(&self, jobs: &'a [Job]) -> Vec<&'a Job> {
        paginate(&self.results, self.page, self.page_size)
            .items
            .iter()
            .filter_map(|&i| jobs.get(i))
            .collect()
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) -> bool {
        let before = self.page;
        self.go_to_page(self.page + 1);
        self.page != before
    }

    pub fn prev_page(&mut self) -> bool {
        let before = self.page;
        self.go_to_page(self.page.saturating_sub(1));
        self.page != before
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.page = 1;
    }

    fn apply(&mut self, jobs: &[Job]) {
        let matched: HashSet<&str> = filter_jobs(jobs, &self.criteria, &self.overrides)
            .into_iter()
            .map(|job| job.id.as_str())
            .collect();
        self.results = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| matched.contains(job.id.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.page = 1;
        debug!(results = self.results.len(), "Listing updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_job, Catalog};
    use crate::clock::FixedClock;

    fn job(id: &str, category: &str) -> Job {
        test_job(id, category, JobType::FullTime)
    }

    /// 8 jobs, 6 of them in Engineering.
    fn catalog() -> Catalog {
        let mut jobs = vec![
            job("1", "Engineering"),
            job("2", "Design"),
            job("3", "Engineering"),
            job("4", "Engineering"),
            job("5", "Marketing"),
            job("6", "Engineering"),
            job("7", "Engineering"),
            job("8", "Engineering"),
        ];
        jobs[1].job_type = JobType::Internship;
        jobs[2].work_type = WorkType::Onsite;
        jobs[3].experience_level = ExperienceLevel::Senior;
        jobs[4].location = Location {
            city: "London".to_string(),
            country: "UK".to_string(),
        };
        jobs[5].title = "Rust Platform Engineer".to_string();
        jobs[6].company = "RUSTACEANS Ltd".to_string();
        jobs[7].salary.min = 150_000;
        jobs[7].salary.max = 250_000;
        Catalog::new(jobs).unwrap()
    }

    fn ids(jobs: &[&Job]) -> Vec<String> {
        jobs.iter().map(|j| j.id.clone()).collect()
    }

    #[test]
    fn test_default_criteria_apply_only_salary_containment() {
        let catalog = catalog();
        let result = filter_jobs(catalog.jobs(), &FilterCriteria::default(), &SearchOverrides::default());
        // Job 8 tops out at 250k, above the default 200k ceiling
        assert_eq!(ids(&result), vec!["1", "2", "3", "4", "5", "6", "7"]);
    }

    #[test]
    fn test_category_override_preserves_order() {
        let catalog = catalog();
        let overrides = SearchOverrides {
            category: Some("Engineering".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria {
            salary: SalaryRange { min: 0, max: 1_000_000 },
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &criteria, &overrides);
        assert_eq!(ids(&result), vec!["1", "3", "4", "6", "7", "8"]);
    }

    #[test]
    fn test_salary_containment_not_overlap() {
        let j = job("x", "Engineering");
        assert_eq!((j.salary.min, j.salary.max), (50_000, 90_000));
        assert!(SalaryRange { min: 0, max: 200_000 }.contains(&j));
        assert!(!SalaryRange { min: 60_000, max: 200_000 }.contains(&j));
        assert!(!SalaryRange { min: 0, max: 80_000 }.contains(&j));
        assert!(SalaryRange { min: 50_000, max: 90_000 }.contains(&j));
    }

    #[test]
    fn test_set_criteria_are_conjunctive() {
        let catalog = catalog();
        let criteria = FilterCriteria {
            job_types: vec![JobType::FullTime],
            work_types: vec![WorkType::Remote, WorkType::Hybrid],
            experience_levels: vec![ExperienceLevel::Mid],
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &criteria, &SearchOverrides::default());
        // 2 is an internship, 3 onsite, 4 senior, 8 out of salary range
        assert_eq!(ids(&result), vec!["1", "5", "6", "7"]);
    }

    #[test]
    fn test_location_criterion_and_override() {
        let catalog = catalog();
        let london = Location {
            city: "London".to_string(),
            country: "UK".to_string(),
        };
        let criteria = FilterCriteria {
            location: Some(london),
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &criteria, &SearchOverrides::default());
        assert_eq!(ids(&result), vec!["5"]);

        let overrides = SearchOverrides {
            location: Some("London, UK".to_string()),
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &FilterCriteria::default(), &overrides);
        assert_eq!(ids(&result), vec!["5"]);

        let overrides = SearchOverrides {
            location: Some(ANY.to_string()),
            job_type: Some(ANY.to_string()),
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &FilterCriteria::default(), &overrides);
        assert_eq!(result.len(), 7);
    }

    #[test]
    fn test_keyword_matches_title_or_company_case_insensitively() {
        let catalog = catalog();
        let overrides = SearchOverrides {
            keyword: Some("rust".to_string()),
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &FilterCriteria::default(), &overrides);
        assert_eq!(ids(&result), vec!["6", "7"]);

        let empty = SearchOverrides {
            keyword: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filter_jobs(catalog.jobs(), &FilterCriteria::default(), &empty).len(), 7);
    }

    #[test]
    fn test_job_type_override_is_exact() {
        let catalog = catalog();
        let overrides = SearchOverrides {
            job_type: Some("Internship".to_string()),
            ..Default::default()
        };
        let result = filter_jobs(catalog.jobs(), &FilterCriteria::default(), &overrides);
        assert_eq!(ids(&result), vec!["2"]);

        let lower = SearchOverrides {
            job_type: Some("internship".to_string()),
            ..Default::default()
        };
        assert!(filter_jobs(catalog.jobs(), &FilterCriteria::default(), &lower).is_empty());
    }

    #[test]
    fn test_results_are_always_a_subset_of_the_catalog() {
        let catalog = catalog();
        let combos = [
            FilterCriteria::default(),
            FilterCriteria {
                job_types: vec![JobType::Internship],
                ..Default::default()
            },
            FilterCriteria {
                salary: SalaryRange { min: 100_000, max: 100_000 },
                ..Default::default()
            },
            FilterCriteria {
                work_types: vec![WorkType::Onsite],
                experience_levels: vec![ExperienceLevel::Entry],
                ..Default::default()
            },
        ];
        for criteria in &combos {
            for job in filter_jobs(catalog.jobs(), criteria, &SearchOverrides::default()) {
                assert!(catalog.jobs().iter().any(|c| std::ptr::eq(c, job)));
            }
        }
    }

    #[test]
    fn test_pagination_page_sizes() {
        let items: Vec<u32> = (0..14).collect();
        let sizes: Vec<usize> = (1..=3).map(|p| paginate(&items, p, PAGE_SIZE).items.len()).collect();
        assert_eq!(sizes, vec![6, 6, 2]);
        assert_eq!(paginate(&items, 1, PAGE_SIZE).total_pages, 3);
    }

    #[test]
    fn test_pagination_clamps_out_of_range_pages() {
        let items: Vec<u32> = (0..14).collect();
        let low = paginate(&items, 0, PAGE_SIZE);
        assert_eq!(low.number, 1);
        assert_eq!(low.items, &items[0..6]);

        let high = paginate(&items, 4, PAGE_SIZE);
        assert_eq!(high.number, 3);
        assert_eq!(high.items, &items[12..14]);

        let empty: Vec<u32> = Vec::new();
        let page = paginate(&empty, 2, PAGE_SIZE);
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_listing_filter_then_reset_returns_full_catalog() {
        let mut jobs: Vec<Job> = (1..=14).map(|i| job(&i.to_string(), "Engineering")).collect();
        jobs[0].job_type = JobType::Internship;
        let catalog = Catalog::new(jobs).unwrap();

        let mut listing = Listing::new();
        listing.refresh(catalog.jobs());
        assert_eq!(listing.result_count(), 14);
        assert_eq!(listing.total_pages(), 3);

        listing.set_criteria(FilterCriteria {
            job_types: vec![JobType::Internship],
            ..Default::default()
        });
        listing.refresh(catalog.jobs());
        assert_eq!(listing.result_count(), 1);

        listing.set_overrides(SearchOverrides {
            category: Some("Engineering".to_string()),
            ..Default::default()
        });
        assert!(listing.is_filtered());

        listing.reset();
        assert!(!listing.is_filtered());
        listing.refresh(catalog.jobs());
        let all: Vec<&str> = listing.results(catalog.jobs()).iter().map(|j| j.id.as_str()).collect();
        let expected: Vec<&str> = catalog.jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_listing_page_navigation_and_reset_on_change() {
        let jobs: Vec<Job> = (1..=14).map(|i| job(&i.to_string(), "Engineering")).collect();
        let catalog = Catalog::new(jobs).unwrap();
        let mut listing = Listing::new();
        listing.refresh(catalog.jobs());

        assert!(!listing.prev_page());
        assert!(listing.next_page());
        assert!(listing.next_page());
        assert!(!listing.next_page());
        assert_eq!(listing.current_page(), 3);
        assert_eq!(listing.page_jobs(catalog.jobs()).len(), 2);

        listing.go_to_page(0);
        assert_eq!(listing.current_page(), 1);
        listing.go_to_page(99);
        assert_eq!(listing.current_page(), 3);

        listing.set_overrides(SearchOverrides {
            keyword: Some("Job 1".to_string()),
            ..Default::default()
        });
        assert_eq!(listing.current_page(), 1);
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let catalog = catalog();
        let mut listing = Listing::new();

        let first = listing.begin_load();
        listing.set_overrides(SearchOverrides {
            category: Some("Design".to_string()),
            ..Default::default()
        });
        let second = listing.begin_load();

        assert!(!listing.finish_load(first, catalog.jobs()));
        assert!(listing.is_loading());
        assert_eq!(listing.result_count(), 0);

        assert!(listing.finish_load(second, catalog.jobs()));
        assert!(!listing.is_loading());
        assert_eq!(listing.result_count(), 1);
    }

    #[tokio::test]
    async fn test_load_publishes_after_delay() {
        let catalog = catalog();
        let clock = FixedClock::new("2026-10-19T12:00:00Z".parse().unwrap());
        let mut listing = Listing::new();
        assert!(listing.load(catalog.jobs(), &clock, Duration::from_millis(500)).await);
        assert_eq!(listing.result_count(), 7);
        assert_eq!(listing.current_page(), 1);
    }
}
