//! A still pool under gravity must fall, settle on the tank floor and
//! stay there.

use tanksim::Simulation;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn average_y(sim: &Simulation) -> f32 {
    let sum: f32 = sim.particles().iter().map(|p| p.position.y).sum();
    sum / sim.particles().len() as f32
}

#[test]
fn test_still_pool_settles() {
    init_logging();
    let mut sim = Simulation::new(600.0, 700.0, 1234);
    sim.toggles.foam = false;
    sim.toggles.metaballs = false;
    sim.params.substeps = 10;
    sim.set_particle_count(150);

    let dt = 1.0 / 60.0;
    let start_y = average_y(&sim);

    let mut window_start_y = start_y;
    let mut last_window_delta = f32::MAX;
    for frame in 0..240 {
        let stats = sim.step(dt).expect("finite dt");
        assert_eq!(stats.substeps_run, 10);

        if (frame + 1) % 60 == 0 {
            let y = average_y(&sim);
            last_window_delta = y - window_start_y;
            window_start_y = y;
        }
    }

    let end_y = average_y(&sim);
    // y grows downward, so settling means the average moved down.
    assert!(
        end_y > start_y + 20.0,
        "pool did not fall: start {start_y:.1}, end {end_y:.1}"
    );
    // Last 60-frame window should be a plateau, not still falling.
    assert!(
        last_window_delta.abs() < 15.0,
        "pool still moving at the end: {last_window_delta:.1} px over the last second"
    );

    // Settled pool sits in the lower part of the tank.
    let tank = sim.tank();
    assert!(
        end_y > tank.min_y() + tank.height * 0.4,
        "settled pool average y {end_y:.1} too high in tank {tank:?}"
    );
    for (i, p) in sim.particles().iter().enumerate() {
        assert!(p.is_finite(), "particle {i} corrupted after settling");
    }
}
