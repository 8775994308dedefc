// Criterion benchmarks for Kindred

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use kindred::core::distance::{calculate_bounding_box, haversine_distance};
use kindred::core::{Matcher, SafetyScanner};
use kindred::models::{Candidate, DiscoveryPreferences};

const INTERESTS: &[&str] = &["hiking", "jazz", "cooking", "chess", "yoga", "film", "travel"];

fn create_candidate(id: usize, lat: f64, lon: f64) -> Candidate {
    Candidate {
        user_id: Uuid::new_v4(),
        display_name: format!("Member {}", id),
        age: 25 + (id % 10) as u8,
        gender: if id % 2 == 0 { "female" } else { "male" }.to_string(),
        bio: None,
        interests: INTERESTS
            .iter()
            .skip(id % INTERESTS.len())
            .take(3)
            .map(|s| s.to_string())
            .collect(),
        photo_urls: vec![],
        latitude: Some(lat),
        longitude: Some(lon),
        is_verified: id % 3 == 0,
        last_active_at: Utc::now() - Duration::hours((id % 200) as i64),
        pref_genders: vec![],
        pref_min_age: 18,
        pref_max_age: 60,
    }
}

fn create_preferences() -> DiscoveryPreferences {
    DiscoveryPreferences {
        user_id: Uuid::new_v4(),
        gender: "male".to_string(),
        age: 30,
        preferred_genders: vec!["female".to_string()],
        min_age: 21,
        max_age: 35,
        max_distance_km: 50,
        interests: vec!["hiking".to_string(), "jazz".to_string()],
        location: Some((40.7128, -74.0060)),
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| haversine_distance(black_box((40.7128, -74.0060)), black_box((40.72, -74.01))));
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box((40.7128, -74.0060)), black_box(50.0)));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let preferences = create_preferences();

    let mut group = c.benchmark_group("discover_rank");

    for candidate_count in [10, 100, 500, 1000].iter() {
        let candidates: Vec<Candidate> = (0..*candidate_count)
            .map(|i| {
                let offset = (i as f64 * 0.001) % 0.5;
                create_candidate(i, 40.7128 + offset, -74.0060 + offset)
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(candidate_count),
            &candidates,
            |b, candidates| {
                b.iter(|| {
                    matcher.rank(
                        black_box(&preferences),
                        black_box(candidates.clone()),
                        20,
                        Utc::now(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_safety_scan(c: &mut Criterion) {
    let scanner = SafetyScanner::default();
    let messages = [
        "Hey! Fancy a coffee on Saturday afternoon?",
        "Add me on snapchat, or text 555 123 4567",
        "I had such a good time at the jazz bar, let's go again next week",
    ];

    c.bench_function("safety_scan", |b| {
        b.iter(|| {
            for message in &messages {
                black_box(scanner.scan(black_box(message)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_ranking,
    bench_safety_scan
);
criterion_main!(benches);
