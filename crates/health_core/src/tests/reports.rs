use super::*;

#[test]
fn report_lists_visible_conditions_with_stacks() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut events = Vec::new();
    for condition in [
        condition_ids::INJURED,
        condition_ids::INJURED,
        condition_ids::INFECTED,
    ] {
        add_condition(
            &mut state,
            &world,
            &content,
            &crew("jeb"),
            &ConditionId(condition.to_string()),
            &mut events,
        );
    }
    let report = crew_report(&mut state, &world, &content, &crew("jeb")).unwrap();
    assert_eq!(report.conditions, ["Injured x2"]);
    assert!((report.hp - 90.0).abs() < 1e-9);
    assert!((report.max_hp - 110.0).abs() < 1e-9);
    assert!(report.summary.starts_with("jeb: 90.0/110.0 HP"));
    assert!(report.summary.ends_with("Injured x2"));
}

#[test]
fn report_predicts_the_next_threshold() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let report = crew_report(&mut state, &world, &content, &crew("jeb")).unwrap();
    assert!(report.net_rate < 0.0);
    let expected = (report.hp - content.constants.exhaustion_start * report.max_hp) / -report.net_rate;
    let days = report.days_to_next_threshold.unwrap();
    assert!((days - expected).abs() < 1e-9);
    assert!(report
        .factors
        .iter()
        .any(|(factor, value)| *factor == FactorId::Isolation && *value < 0.0));
}

#[test]
fn report_reuses_values_cached_this_tick() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 1);
    let generation = state.meta.generation;
    assert!(state.records[&crew("jeb")].effect.fresh(generation).is_some());

    let cached = crew_report(&mut state, &world, &content, &crew("jeb")).unwrap();
    state.records.get_mut(&crew("jeb")).unwrap().invalidate();
    let fresh = crew_report(&mut state, &world, &content, &crew("jeb")).unwrap();
    assert!((cached.net_rate - fresh.net_rate).abs() < 1e-9);
    assert!(state.records[&crew("jeb")].effect.fresh(generation).is_some());
}

#[test]
fn report_for_unknown_crew_is_none() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    assert!(crew_report(&mut state, &world, &content, &crew("ghost")).is_none());
}

#[test]
fn dead_crew_report_says_so() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    state.records.get_mut(&crew("jeb")).unwrap().dead = true;
    let report = crew_report(&mut state, &world, &content, &crew("jeb")).unwrap();
    assert!(report.dead);
    assert_eq!(report.summary, "jeb: dead");
}

#[test]
fn training_percent_tracks_the_design_at_base() {
    let content = base_content();
    let mut world = base_world("bob");
    world.facility_level = 2;
    let mut state = base_state(&world, &content);
    let mut events = Vec::new();
    start_training(
        &mut state,
        &world,
        &content,
        &crew("bob"),
        &crewed_vessel("design", &[]),
        &mut events,
    );
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 10);
    let report = crew_report(&mut state, &world, &content, &crew("bob")).unwrap();
    assert!(report.training_percent > 0.0 && report.training_percent < 100.0);
}

#[test]
fn design_estimate_does_not_touch_state() {
    let content = base_content();
    let world = base_world("bob");
    let state = base_state(&world, &content);
    let before = serde_json::to_string(&state).unwrap();

    let design = crewed_vessel("design", &["bob"]);
    let estimate = estimate_for_design(&state, &world, &content, &crew("bob"), &design).unwrap();
    assert_eq!(serde_json::to_string(&state).unwrap(), before);

    assert!((estimate.max_hp - 110.0).abs() < 1e-9);
    assert!(estimate.net_rate < 0.0);
    let to_zero = estimate.days_to_zero.unwrap();
    let to_exhaustion = estimate.days_to_exhaustion.unwrap();
    assert!((to_zero - 110.0 / -estimate.net_rate).abs() < 1e-9);
    assert!(to_exhaustion < to_zero);
    assert!(estimate.shelter_exposure <= estimate.exposure + 1e-12);
}

#[test]
fn comfortable_design_never_runs_out() {
    let content = base_content();
    let world = base_world("bob");
    let state = base_state(&world, &content);
    let mut design = crewed_vessel("design", &["bob"]);
    design.parts[0].hp_change_per_day = 50.0;
    let estimate = estimate_for_design(&state, &world, &content, &crew("bob"), &design).unwrap();
    assert!(estimate.net_rate > 0.0);
    assert!(estimate.days_to_zero.is_none());
    assert!(estimate.days_to_exhaustion.is_none());
}
