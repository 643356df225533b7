//! Property-based tests for the pantry domain.
//!
//! These cover the join that nests items under locations, the expiry arithmetic,
//! and the input rules, over generated inputs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use pantry_api::models::{Item, WriteItemParams};
use pantry_api::repositories::{InMemoryRepository, ItemFilter, Repository};
use pantry_api::services::locations::assemble_locations;
use pantry_api::validation::InputValidator;

fn base_params(name: String) -> WriteItemParams {
    WriteItemParams {
        name,
        item_type: None,
        tags: vec![],
        price: None,
        image_url: None,
        bought_at: fixed_now(),
        opened_at: None,
        expires_at: None,
        lifespan: None,
        location_id: None,
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

/// Where a generated item points: nowhere, one of the locations, or a stale id.
#[derive(Debug, Clone)]
enum Placement {
    Unassigned,
    At(usize),
    Stale,
}

fn placement_strategy(location_count: usize) -> impl Strategy<Value = Placement> {
    prop_oneof![
        Just(Placement::Unassigned),
        (0..location_count).prop_map(Placement::At),
        Just(Placement::Stale),
    ]
}

fn pantry_strategy() -> impl Strategy<Value = (usize, Vec<Placement>)> {
    (1usize..5).prop_flat_map(|count| {
        (
            Just(count),
            prop::collection::vec(placement_strategy(count), 0..25),
        )
    })
}

fn tag_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["veg", "dairy", "dry", "frozen", "snack"]).prop_map(str::to_string)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_item_lands_in_exactly_one_place((count, placements) in pantry_strategy()) {
        let view = runtime().block_on(async {
            let repo = InMemoryRepository::new();
            let mut location_ids = Vec::new();
            for n in 0..count {
                location_ids.push(repo.create_location(&format!("Shelf {}", n)).await.unwrap().id);
            }
            for (n, placement) in placements.iter().enumerate() {
                let mut params = base_params(format!("Item {}", n));
                params.location_id = match placement {
                    Placement::Unassigned => None,
                    Placement::At(pos) => Some(location_ids[*pos].clone()),
                    Placement::Stale => Some("gone".to_string()),
                };
                repo.create_item(&params).await.unwrap();
            }
            assemble_locations(&repo, None, None).await.unwrap()
        });

        prop_assert_eq!(view.locations.len(), count);

        let expected_remaining: Vec<String> = placements
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p, Placement::Unassigned))
            .map(|(n, _)| format!("Item {}", n))
            .collect();
        let remaining: Vec<String> = view.remaining_items.iter().map(|i| i.name.clone()).collect();
        prop_assert_eq!(remaining, expected_remaining);

        for (pos, location) in view.locations.iter().enumerate() {
            let expected: Vec<String> = placements
                .iter()
                .enumerate()
                .filter(|(_, p)| matches!(p, Placement::At(at) if *at == pos))
                .map(|(n, _)| format!("Item {}", n))
                .collect();
            let nested: Vec<String> = location.items.iter().map(|i| i.name.clone()).collect();
            prop_assert_eq!(nested, expected);
            prop_assert!(location.items.iter().all(|i| i.location_id.as_deref() == Some(location.id.as_str())));
        }

        let stale = placements.iter().filter(|p| matches!(p, Placement::Stale)).count();
        let placed: usize = view.locations.iter().map(|l| l.items.len()).sum();
        prop_assert_eq!(placed + view.remaining_items.len() + stale, placements.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn days_left_takes_the_more_urgent_signal(expires_in in -60i64..60, lifespan in 0i64..60, opened_ago in 0i64..30) {
        let now = fixed_now();
        let mut params = base_params("Soup".into());
        params.expires_at = Some(now + Duration::days(expires_in));
        params.opened_at = Some(now - Duration::days(opened_ago));
        params.lifespan = Some(lifespan);
        let item = Item::from_params("soup", params);

        prop_assert_eq!(item.days_left_at(now), Some(expires_in.min(lifespan - opened_ago)));
    }

    #[test]
    fn partial_days_round_up(hours in -2000i64..2000) {
        let now = fixed_now();
        let mut params = base_params("Soup".into());
        params.expires_at = Some(now + Duration::hours(hours));
        let item = Item::from_params("soup", params);

        let expected = (hours as f64 / 24.0).ceil() as i64;
        prop_assert_eq!(item.days_left_at(now), Some(expected));
    }

    #[test]
    fn location_names_up_to_fifty_chars_pass(name in "\\PC{1,50}") {
        prop_assert!(InputValidator::new().validate_location_name(&name).is_ok());
    }

    #[test]
    fn location_names_over_fifty_chars_fail(name in "\\PC{51,80}") {
        prop_assert!(InputValidator::new().validate_location_name(&name).is_err());
    }

    #[test]
    fn tag_filter_matches_any_shared_tag(
        item_tags in prop::collection::vec(tag_strategy(), 0..4),
        wanted in prop::collection::vec(tag_strategy(), 0..4),
    ) {
        let mut params = base_params("Snack".into());
        params.tags = item_tags.clone();
        let item = Item::from_params("snack", params);

        let shares_tag = item_tags.iter().any(|t| wanted.contains(t));
        prop_assert_eq!(ItemFilter::new(Some(wanted), None).matches(&item), shares_tag);
        prop_assert!(ItemFilter::new(None, None).matches(&item));
    }
}
