use chrono::NaiveDate;
use rand::{SeedableRng, rngs::StdRng};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::api::{ImmichClient, MetadataQuery};
use crate::config::Configuration;
use crate::error::{ApiError, Result};
use crate::grouping::{self, PhotoGroup, PhotoRecord};

/// Mimetype suffixes the slideshow can display.
pub const PICTURE_FORMATS: [&str; 10] = [
    "bmp", "jpeg", "jpg", "gif", "png", "tiff", "mng", "ico", "pcx", "tga",
];

pub fn is_displayable(mime_type: &str) -> bool {
    let mime_type = mime_type.to_ascii_lowercase();
    PICTURE_FORMATS.iter().any(|ext| mime_type.ends_with(ext))
}

/// `takenAfter` / `takenBefore` bounds covering the whole of `date`.
pub fn day_window(date: NaiveDate) -> (String, String) {
    let day = date.format("%Y-%m-%d");
    (
        format!("{day}T00:00:00.000Z"),
        format!("{day}T23:59:59.999Z"),
    )
}

/// Collects every displayable photo captured on `date`, following `nextPage` until exhausted.
pub async fn fetch_day(client: &ImmichClient, date: NaiveDate) -> Result<Vec<PhotoRecord>> {
    let (after, before) = day_window(date);
    let first = MetadataQuery::new(after, before);
    let mut query = first.clone();
    let mut seen_tokens: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut pages = 0usize;

    loop {
        let page = client.search_metadata(&query).await?;
        pages += 1;
        for item in &page.items {
            let displayable = item
                .original_mime_type
                .as_deref()
                .is_some_and(is_displayable);
            if !displayable {
                continue;
            }
            match PhotoRecord::from_asset(item) {
                Some(record) => records.push(record),
                None => warn!(
                    id = %item.id,
                    local_date_time = %item.local_date_time,
                    "skipping asset with unreadable capture time"
                ),
            }
        }
        match page.next_page_token() {
            Some(token) => {
                if !seen_tokens.insert(token.clone()) {
                    return Err(ApiError::remote(format!(
                        "metadata search for {date} repeated page token {token}"
                    )));
                }
                query = first.at_page(&token);
            }
            None => break,
        }
    }

    debug!(%date, pages, photos = records.len(), "fetched day");
    Ok(records)
}

/// Asks the server for one random asset and returns the day it was captured.
pub async fn pick_date(client: &ImmichClient) -> Result<NaiveDate> {
    let assets = client.random_assets(1).await?;
    let asset = assets
        .first()
        .ok_or_else(|| ApiError::remote("random search returned no assets"))?;
    asset
        .local_date_time
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| {
            ApiError::remote(format!(
                "asset {} has unreadable localDateTime {:?}",
                asset.id, asset.local_date_time
            ))
        })
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub group_limit: usize,
    pub keep_bursts: bool,
    pub burst_lead_in: bool,
    pub fixed_date: Option<NaiveDate>,
}

impl PlanOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            group_limit: cfg.group_limit,
            keep_bursts: cfg.show_burst,
            burst_lead_in: cfg.burst_lead_in,
            fixed_date: cfg.date,
        }
    }
}

/// Groups chosen for one display cycle.
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub groups: Vec<PhotoGroup>,
    /// Displayable photos found for the date.
    pub photos: usize,
    /// Clusters found before the limit window was applied.
    pub clusters: usize,
}

impl DayPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Picks dates and turns them into display groups.
pub struct Planner {
    client: ImmichClient,
    options: PlanOptions,
    rng: StdRng,
}

impl Planner {
    pub fn new(client: ImmichClient, options: PlanOptions, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            client,
            options,
            rng,
        }
    }

    pub fn client(&self) -> &ImmichClient {
        &self.client
    }

    /// Groups for one cycle: random (or pinned) date, all its photos, clustered and windowed.
    pub async fn next_groups(&mut self) -> Result<DayPlan> {
        let date = match self.options.fixed_date {
            Some(date) => date,
            None => pick_date(&self.client).await?,
        };
        let records = fetch_day(&self.client, date).await?;
        Ok(self.plan_day(date, records))
    }

    fn plan_day(&mut self, date: NaiveDate, records: Vec<PhotoRecord>) -> DayPlan {
        let photos = records.len();
        let clusters = grouping::group_bursts(records, self.options.keep_bursts);
        let cluster_count = clusters.len();
        let mut groups = grouping::limit_groups(clusters, self.options.group_limit, &mut self.rng);
        if self.options.keep_bursts && self.options.burst_lead_in {
            groups = grouping::insert_burst_lead_ins(groups);
        }
        info!(
            %date,
            photos,
            clusters = cluster_count,
            groups = groups.len(),
            limit = self.options.group_limit,
            "planned day"
        );
        DayPlan {
            date,
            groups,
            photos,
            clusters: cluster_count,
        }
    }
}
