use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::amap::{PlaceCandidate, PlaceError, PlaceSearch};
use crate::models::ResolvedPlace;
use crate::planner::region::mentions_region;

/// Waits between place searches. The provider enforces a per-second quota,
/// so keywords are resolved one at a time.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub between_keywords: Duration,
    pub before_prefixed_retry: Duration,
    pub after_rate_limit: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_keywords: Duration::from_millis(200),
            before_prefixed_retry: Duration::from_millis(100),
            after_rate_limit: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            between_keywords: Duration::ZERO,
            before_prefixed_retry: Duration::ZERO,
            after_rate_limit: Duration::ZERO,
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

static BUSINESS_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[(（](暂停开放|已关闭|停业|装修中|永久关闭|临时关闭|营业中|24小时营业|节假日休息)[)）]")
        .expect("hard-coded pattern is valid")
});
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("hard-coded pattern is valid"));

/// Drops business-status annotations such as "(暂停开放)" from a place name.
pub fn clean_place_name(name: &str) -> String {
    let stripped = BUSINESS_STATUS.replace_all(name, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn candidate_in_region(candidate: &PlaceCandidate, region: &str) -> bool {
    [&candidate.cityname, &candidate.address]
        .into_iter()
        .flatten()
        .any(|field| mentions_region(field, region))
}

fn place_in_region(place: &ResolvedPlace, region: &str) -> bool {
    [&place.city, &place.address]
        .into_iter()
        .flatten()
        .any(|field| mentions_region(field, region))
}

/// Picks the candidate to pin for a keyword. With a region, only a candidate
/// located there qualifies; without one, the top hit does.
pub fn select_candidate<'a>(
    candidates: &'a [PlaceCandidate],
    region: Option<&str>,
) -> Option<&'a PlaceCandidate> {
    match region {
        Some(region) => candidates.iter().find(|c| candidate_in_region(c, region)),
        None => candidates.first(),
    }
}

/// Keeps only places located in `region`.
pub fn retain_in_region(places: Vec<ResolvedPlace>, region: Option<&str>) -> Vec<ResolvedPlace> {
    let Some(region) = region else {
        return places;
    };

    let total = places.len();
    let kept: Vec<ResolvedPlace> = places
        .into_iter()
        .filter(|place| {
            let keep = place_in_region(place, region);
            if !keep {
                info!(
                    "Dropping {} ({:?}): outside {}",
                    place.name, place.city, region
                );
            }
            keep
        })
        .collect();

    info!("{}/{} places are in {}", kept.len(), total, region);
    kept
}

/// Resolves plan keywords to places, one search at a time.
pub struct PoiResolver<'a> {
    search: &'a dyn PlaceSearch,
    pacing: Pacing,
}

impl<'a> PoiResolver<'a> {
    pub fn new(search: &'a dyn PlaceSearch, pacing: Pacing) -> Self {
        Self { search, pacing }
    }

    /// Resolves every keyword in order and returns at most one place per
    /// keyword. A keyword that fails is skipped; the batch always finishes.
    pub async fn resolve_all(&self, keywords: &[String], region: Option<&str>) -> Vec<ResolvedPlace> {
        let mut places = Vec::new();

        for (index, keyword) in keywords.iter().enumerate() {
            if index > 0 {
                pause(self.pacing.between_keywords).await;
            }

            match self.resolve_one(keyword, region).await {
                Ok(Some(place)) => {
                    info!("Pinned {} for '{}' ({:?})", place.name, keyword, place.city);
                    places.push(place);
                }
                Ok(None) => {}
                Err(e) if e.is_rate_limited() => {
                    warn!("Place search throttled on '{}': {}", keyword, e);
                    pause(self.pacing.after_rate_limit).await;
                }
                Err(e) => {
                    warn!("Place search failed for '{}': {}", keyword, e);
                }
            }
        }

        retain_in_region(places, region)
    }

    async fn resolve_one(
        &self,
        keyword: &str,
        region: Option<&str>,
    ) -> Result<Option<ResolvedPlace>, PlaceError> {
        let mut candidates = self.search.search(keyword, region).await?;
        debug!("'{}' returned {} candidates", keyword, candidates.len());

        if let Some(region) = region {
            if !candidates.iter().any(|c| candidate_in_region(c, region)) {
                pause(self.pacing.before_prefixed_retry).await;
                let prefixed = format!("{}{}", region, keyword);
                let retried = self.search.search(&prefixed, Some(region)).await?;
                debug!("'{}' returned {} candidates", prefixed, retried.len());
                if !retried.is_empty() {
                    candidates = retried;
                }
            }
        }

        if candidates.is_empty() {
            info!("No place found for '{}'", keyword);
            return Ok(None);
        }

        let Some(selected) = select_candidate(&candidates, region) else {
            let seen: Vec<&str> = candidates
                .iter()
                .filter_map(|c| c.cityname.as_deref())
                .collect();
            info!(
                "Skipping '{}': nothing in {:?}, candidates were in {:?}",
                keyword, region, seen
            );
            return Ok(None);
        };

        let Some(coordinate) = selected.coordinate() else {
            warn!(
                "Skipping '{}': bad location {:?} on {}",
                keyword, selected.location, selected.name
            );
            return Ok(None);
        };

        Ok(Some(ResolvedPlace {
            name: clean_place_name(&selected.name),
            city: selected
                .cityname
                .clone()
                .or_else(|| region.map(str::to_string)),
            address: selected.address.clone(),
            lat: coordinate.lat,
            lng: coordinate.lng,
        }))
    }
}
