use jobhunt_core::{Job, Profile};
use jobhunt_matcher::{
    filter_and_rank, partition_matches, score, JobScorer, MatchBucket, MatchConfig,
    ScoreThresholds,
};

fn program_director_profile() -> Profile {
    Profile {
        name: "Candidate".into(),
        target_roles: vec!["Program Director".into()],
        years_experience: 8,
        ..Default::default()
    }
}

fn east_africa_job() -> Job {
    let mut job = Job::new(
        "reliefweb",
        "https://reliefweb.int/job/4001",
        "Senior Program Director - East Africa",
    )
    .with_location("Nairobi, Kenya");
    job.experience_required = Some("5-10 years".into());
    job
}

#[test]
fn program_director_scenario_scores_73_5() {
    let scorer = JobScorer::new(program_director_profile(), MatchConfig::default()).unwrap();
    let breakdown = scorer.breakdown(&east_africa_job());
    assert_eq!(breakdown.title, 100.0);
    assert_eq!(breakdown.location, 90.0);
    assert_eq!(breakdown.skills, 30.0);
    assert_eq!(breakdown.experience, 100.0);
    assert_eq!(breakdown.donor, 30.0);
    assert_eq!(breakdown.composite, 73.5);
}

#[test]
fn one_shot_scoring_matches_scorer_and_is_deterministic() {
    let profile = program_director_profile();
    let config = MatchConfig::default();
    let job = east_africa_job();
    let first = score(&job, &profile, &config).unwrap();
    let second = score(&job, &profile, &config).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());
    assert_eq!(first, 73.5);
}

#[test]
fn scenario_job_is_a_high_match() {
    let config = MatchConfig {
        thresholds: ScoreThresholds {
            low: 50.0,
            high: 70.0,
        },
        ..Default::default()
    };
    let scorer = JobScorer::new(program_director_profile(), config.clone()).unwrap();
    let scored = scorer.score_all(vec![east_africa_job()]);
    let outcome = filter_and_rank(scored, &config);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(config.thresholds.bucket(73.5), MatchBucket::High);
    let (high, good) = partition_matches(&outcome.matches, &config.thresholds);
    assert_eq!(high.len(), 1);
    assert!(good.is_empty());
}

#[test]
fn scores_stay_in_range_for_varied_jobs() {
    let profile = Profile {
        target_roles: vec!["Country Director".into(), "Chief of Party".into()],
        target_locations: vec!["Somalia".into()],
        years_experience: 12,
        skills: vec!["grant management".into(), "monitoring evaluation".into()],
        sectors: vec!["food security".into()],
        donors_experience: vec!["USAID".into(), "ECHO".into(), "FCDO".into()],
        keywords_boost: vec!["resilience".into()],
        ..Default::default()
    };
    let scorer = JobScorer::new(profile, MatchConfig::default()).unwrap();

    let mut rich = Job::new("devex", "https://devex.com/jobs/1", "Chief of Party")
        .with_organization("USAID implementing partner")
        .with_location("Mogadishu, Somalia")
        .with_description(
            "Lead grant management and monitoring evaluation for a food security \
             resilience program funded by USAID and ECHO. Minimum 10 years experience.",
        );
    rich.salary = Some("$9,000 per month".into());
    let empty = Job::new("unjobs", "https://unjobs.org/vacancies/2", "");
    let noisy = Job::new("ethiojobs", "https://ethiojobs.net/3", "!!!")
        .with_location("???")
        .with_description("9999999999999999999999 years $$$ €€€ 1,2,3 usd");

    let scored = scorer.score_all(vec![rich, empty, noisy]);
    for job in &scored {
        let score = job.score.expect("scored");
        assert!((0.0..=100.0).contains(&score), "{score} out of range");
    }
    assert!(scored[0].score > scored[1].score);
    assert_eq!(scored[1].title, "");
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn scorer_is_shareable_and_order_independent() {
    assert_send_sync::<JobScorer>();

    let profile = Profile {
        target_roles: vec!["Program Director".into(), "Country Director".into()],
        target_locations: vec!["Somalia".into()],
        years_experience: 9,
        skills: vec!["grant management".into(), "resilience programming".into()],
        donors_experience: vec!["USAID".into(), "ECHO".into()],
        ..Default::default()
    };
    let scorer = JobScorer::new(profile, MatchConfig::default()).unwrap();
    let locations = ["Nairobi, Kenya", "Addis Ababa", "Remote", "Lima, Peru", ""];
    let jobs: Vec<Job> = (0..50)
        .map(|i| {
            let mut job = Job::new(
                "devex",
                format!("https://www.devex.com/jobs/{i}"),
                if i % 3 == 0 { "Country Director" } else { "Grants Officer" },
            )
            .with_location(locations[i % locations.len()])
            .with_description(&format!(
                "Grant management for USAID programmes. {} years experience.",
                i % 15
            ));
            job.experience_required = (i % 2 == 0).then(|| format!("{}-{} years", i % 7, i % 7 + 4));
            job
        })
        .collect();

    let sequential: Vec<u64> = jobs.iter().map(|job| scorer.score(job).to_bits()).collect();

    let mut parallel = vec![0u64; jobs.len()];
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .enumerate()
            .rev()
            .map(|(i, job)| {
                let scorer = &scorer;
                scope.spawn(move || (i, scorer.score(job).to_bits()))
            })
            .collect();
        for handle in handles {
            let (i, bits) = handle.join().unwrap();
            parallel[i] = bits;
        }
    });
    assert_eq!(sequential, parallel);

    let mut reversed = jobs.clone();
    reversed.reverse();
    let mut rescored: Vec<u64> = scorer
        .score_all(reversed)
        .iter()
        .map(|job| job.score.unwrap().to_bits())
        .collect();
    rescored.reverse();
    assert_eq!(sequential, rescored);
}
