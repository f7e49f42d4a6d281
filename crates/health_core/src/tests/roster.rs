use super::*;

#[test]
fn new_trackable_crew_get_a_record_at_full_health() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&WorldSnapshot::default(), &content);
    let mut rng = make_rng();
    let mut cache = VesselCache::new();
    tick(&mut state, &world, &content, &mut cache, &mut rng, 0.0, EventLevel::Normal);
    let record = &state.records[&crew("jeb")];
    assert!((record.hp - 110.0).abs() < 1e-9);
}

#[test]
fn crew_removed_from_roster_lose_their_record() {
    let content = base_content();
    let mut world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 1);
    world.crew.clear();
    run_days(&mut state, &world, &content, &mut rng, 1);
    assert!(state.records.is_empty());
}

#[test]
fn untrackable_crew_are_frozen() {
    let content = base_content();
    let mut world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    world.crew.get_mut(&crew("jeb")).unwrap().status = RosterStatus::Missing;
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 5);
    let record = &state.records[&crew("jeb")];
    assert!((record.hp - 110.0).abs() < 1e-9);
    assert!(record.dose.abs() < f64::EPSILON);
}

#[test]
fn crew_at_base_recover_at_the_base_rate() {
    let content = base_content();
    let world = base_world("bob");
    let mut state = base_state(&world, &content);
    state.records.get_mut(&crew("bob")).unwrap().hp = 50.0;
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 1);
    assert!((state.records[&crew("bob")].hp - 55.0).abs() < 1e-9);

    run_days(&mut state, &world, &content, &mut rng, 30);
    assert!((state.records[&crew("bob")].hp - 110.0).abs() < 1e-9, "capped at MaxHP");
}

#[test]
fn crew_on_a_mission_lose_health() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 3);
    let record = &state.records[&crew("jeb")];
    assert!(record.hp < 110.0);
    assert!((state.meta.day - 3.0).abs() < 1e-12);
}

#[test]
fn zero_health_kills_once() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    state.records.get_mut(&crew("jeb")).unwrap().hp = 0.5;
    let mut rng = make_rng();
    let events = run_days(&mut state, &world, &content, &mut rng, 3);
    let record = &state.records[&crew("jeb")];
    assert!(record.dead);
    assert!(record.hp.abs() < f64::EPSILON);
    assert_eq!(count_events(&events, |e| matches!(e, Event::CrewDied { .. })), 1);
}

#[test]
fn without_death_crew_linger_at_zero() {
    let mut content = base_content();
    content.settings.death_enabled = false;
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    state.records.get_mut(&crew("jeb")).unwrap().hp = 0.5;
    let mut rng = make_rng();
    let events = run_days(&mut state, &world, &content, &mut rng, 3);
    let record = &state.records[&crew("jeb")];
    assert!(!record.dead);
    assert!(record.hp.abs() < f64::EPSILON);
    assert_eq!(count_events(&events, |e| matches!(e, Event::CrewDied { .. })), 0);
}

#[test]
fn vessel_cache_holds_one_entry_per_vessel_per_tick() {
    let content = base_content();
    let mut world = single_crew_world("jeb");
    let mut mate = test_fixtures::assigned_context();
    mate.trait_name = "Scientist".to_string();
    world.crew.insert(crew("bill"), mate);
    world.vessels.insert(
        VesselId("v1".to_string()),
        crewed_vessel("v1", &["jeb", "bill"]),
    );
    let mut state = base_state(&world, &content);
    let mut rng = make_rng();
    let mut cache = VesselCache::new();
    tick(&mut state, &world, &content, &mut cache, &mut rng, 1.0, EventLevel::Normal);
    assert_eq!(cache.len(), 1);
    cache.begin_tick(state.meta.generation + 1);
    assert!(cache.is_empty());
}

#[test]
fn dormant_vessels_keep_composition_factors() {
    let content = base_content();
    let mut world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut rng = make_rng();
    run_days(&mut state, &world, &content, &mut rng, 1);
    let crowding = state.records[&crew("jeb")].factors.value[&FactorId::Crowding];

    let vessel = world.vessels.get_mut(&VesselId("v1".to_string())).unwrap();
    vessel.loaded = false;
    vessel.parts[0].space = 20.0;
    run_days(&mut state, &world, &content, &mut rng, 1);
    let dormant = state.records[&crew("jeb")].factors.value[&FactorId::Crowding];
    assert!((dormant - crowding).abs() < 1e-12);

    world.vessels.get_mut(&VesselId("v1".to_string())).unwrap().loaded = true;
    run_days(&mut state, &world, &content, &mut rng, 1);
    let loaded = state.records[&crew("jeb")].factors.value[&FactorId::Crowding];
    assert!(loaded > crowding, "more space, less crowding");
}

#[test]
fn same_seed_same_history() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let run = || {
        let mut state = base_state(&world, &content);
        let mut rng = make_rng();
        let mut events = Vec::new();
        let mut cache = VesselCache::new();
        for _ in 0..30 {
            events.extend(tick(&mut state, &world, &content, &mut cache, &mut rng, 1.0, EventLevel::Normal));
            events.extend(process_events(&mut state, &world, &content, &mut rng));
        }
        (serde_json::to_string(&events).unwrap(), state.records[&crew("jeb")].hp)
    };
    let (a_events, a_hp) = run();
    let (b_events, b_hp) = run();
    assert_eq!(a_events, b_events);
    assert!((a_hp - b_hp).abs() < f64::EPSILON);
}

#[test]
fn event_ids_are_sequential() {
    let content = base_content();
    let world = single_crew_world("jeb");
    let mut state = base_state(&world, &content);
    let mut events = Vec::new();
    for condition in [condition_ids::SICK, condition_ids::PANICKING] {
        add_condition(
            &mut state,
            &world,
            &content,
            &crew("jeb"),
            &ConditionId(condition.to_string()),
            &mut events,
        );
    }
    let ids: Vec<&str> = events.iter().map(|e| e.id.0.as_str()).collect();
    assert_eq!(ids, ["evt_000000", "evt_000001", "evt_000002"]);
}

/// A lone level 0 pilot aboard a vessel whose only part recuperates and
/// decays health, with `assigned` HP per day from the Assigned factor.
fn decaying_mission(recuperation: f64, decay: f64, assigned: f64) -> (HealthContent, WorldSnapshot) {
    let mut content = base_content();
    content.factors = vec![FactorDef {
        factor: FactorId::Assigned,
        base_change_per_day: assigned,
    }];
    content.settings.radiation_enabled = false;
    content.settings.training_enabled = false;
    let mut world = single_crew_world("jeb");
    world.crew.get_mut(&crew("jeb")).unwrap().level = 0;
    let vessel = world.vessels.get_mut(&VesselId("v1".to_string())).unwrap();
    vessel.parts[0].recuperation = recuperation;
    vessel.parts[0].decay = decay;
    (content, world)
}

/// HP and death after `ticks` ticks of `dt` days each.
fn warp(content: &HealthContent, world: &WorldSnapshot, ticks: u32, dt: f64) -> (f64, bool) {
    let mut state = base_state(world, content);
    let mut rng = make_rng();
    let mut cache = VesselCache::new();
    for _ in 0..ticks {
        tick(&mut state, world, content, &mut cache, &mut rng, dt, EventLevel::Normal);
    }
    let record = &state.records[&crew("jeb")];
    (record.hp, record.dead)
}

#[test]
fn one_long_tick_matches_many_short_ones_under_decay() {
    let (content, world) = decaying_mission(0.0, 1.0, 0.0);
    let (daily_hp, daily_dead) = warp(&content, &world, 200, 1.0);
    let (warped_hp, warped_dead) = warp(&content, &world, 1, 200.0);
    assert!(!daily_dead);
    assert!(!warped_dead, "a single long tick must not kill");
    assert!((daily_hp - 100.0 * (-2.0_f64).exp()).abs() < 1e-6);
    assert!((warped_hp - daily_hp).abs() < 1e-6);
}

#[test]
fn long_tick_settles_at_the_recuperation_equilibrium() {
    // dHP/dt = -1 + 0.02 (100 - HP) - 0.01 HP settles at 100/3.
    let (content, world) = decaying_mission(2.0, 1.0, -1.0);
    let (daily_hp, _) = warp(&content, &world, 200, 1.0);
    let (warped_hp, warped_dead) = warp(&content, &world, 1, 200.0);
    assert!(!warped_dead);
    assert!((warped_hp - daily_hp).abs() < 1e-6);
    let equilibrium = 100.0 / 3.0;
    let expected = equilibrium + (100.0 - equilibrium) * (-0.03_f64 * 200.0).exp();
    assert!((warped_hp - expected).abs() < 1e-6);
}

#[test]
fn long_tick_without_recuperation_stays_linear() {
    let (content, world) = decaying_mission(0.0, 0.0, -2.0);
    let (hp, dead) = warp(&content, &world, 1, 30.0);
    assert!(!dead);
    assert!((hp - 40.0).abs() < 1e-9);
    let (hp, dead) = warp(&content, &world, 1, 60.0);
    assert!(dead);
    assert!(hp.abs() < f64::EPSILON);
}
