mod tests {
    use embassy_time::Instant;
    use sectional_composer::arbiter::{OwnerId, ResourceArbiter};
    use sectional_composer::color::{BLACK, Rgb, WHITE, scale_color};
    use sectional_composer::config::{CategoryPalette, EngineConfig, LED_CHANNEL};
    use sectional_composer::effect::{
        EffectKind, EffectParams, EffectRequest, EffectState, heat_color,
    };
    use sectional_composer::engine::{EffectEngine, MAX_EFFECTS};
    use sectional_composer::error::{CoreError, DriverError};
    use sectional_composer::health::SafeState;
    use sectional_composer::station::{StationFlags, StationTable};
    use sectional_composer::trigger::TriggerQueue;
    use sectional_composer::OutputDriver;

    const STATIONS: [&str; 4] = ["KDEN", "KBOS", "KXXX", "KSEA"];
    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };

    const NORMAL: SafeState = SafeState {
        epoch: 0,
        active: false,
    };

    const PALETTE: CategoryPalette = CategoryPalette::DEFAULT;

    fn table() -> StationTable<4> {
        let table = StationTable::new(&STATIONS, PALETTE).unwrap();
        for (id, category) in STATIONS.iter().zip(["VFR", "MVFR", "IFR", "LIFR"]) {
            table
                .set_station(id, category, None, StationFlags::default())
                .unwrap();
        }
        table
    }

    fn base_frame() -> Vec<Rgb> {
        vec![PALETTE.vfr, PALETTE.mvfr, PALETTE.ifr, PALETTE.lifr]
    }

    fn solid(color: Rgb) -> EffectParams {
        EffectParams::default().with_color(color)
    }

    #[derive(Default)]
    struct RecordingDriver {
        frames: Vec<Vec<Rgb>>,
        fail: bool,
    }

    impl OutputDriver for RecordingDriver {
        fn write(&mut self, colors: &[Rgb]) -> Result<(), DriverError> {
            if self.fail {
                return Err(DriverError("nack"));
            }
            self.frames.push(colors.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_base_colors_without_effects() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let frame = engine.advance(0, &table.snapshot(), NORMAL).to_vec();
        assert_eq!(frame, base_frame());
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_blink_scenario_completes_and_restores_base() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let id = queue
            .trigger(&table)
            .trigger_effect(
                EffectKind::Blink,
                &["KDEN"],
                10,
                40,
                solid(WHITE).with_period(4),
            )
            .unwrap();

        let mut kden = Vec::new();
        for tick in 0..=40 {
            let frame = engine.advance(tick, &table.snapshot(), NORMAL);
            kden.push(frame[0]);
            if tick < 40 {
                assert_eq!(engine.state(id), Some(EffectState::Running));
            }
        }

        assert_eq!(&kden[..4], &[WHITE, WHITE, BLACK, BLACK]);
        assert_eq!(kden[38], BLACK);
        assert_eq!(engine.state(id), Some(EffectState::Completed));
        assert_eq!(kden[40], PALETTE.vfr);
        assert_eq!(&engine.frame()[1..], &base_frame()[1..]);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_priority_ten_beats_five() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let high = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 10, 100, solid(BLUE))
            .unwrap();
        let low = trigger
            .trigger_effect(EffectKind::Static, &["KDEN", "KBOS"], 5, 100, solid(RED))
            .unwrap();

        for tick in 0..10 {
            let frame = engine.advance(tick, &table.snapshot(), NORMAL);
            assert_eq!(frame[0], BLUE);
            assert_eq!(frame[1], RED);
        }
        assert_eq!(engine.state(high), Some(EffectState::Running));
        assert_eq!(engine.state(low), Some(EffectState::Running));
    }

    #[test]
    fn test_higher_priority_start_preempts() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let low = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 5, 100, solid(RED))
            .unwrap();
        assert_eq!(engine.advance(0, &table.snapshot(), NORMAL)[0], RED);

        let high = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 10, 3, solid(BLUE))
            .unwrap();
        assert_eq!(engine.advance(1, &table.snapshot(), NORMAL)[0], BLUE);
        assert_eq!(engine.state(low), Some(EffectState::Preempted));

        // the preempted effect never resumes
        for tick in 2..10 {
            engine.advance(tick, &table.snapshot(), NORMAL);
        }
        assert_eq!(engine.state(high), Some(EffectState::Completed));
        assert_eq!(engine.frame()[0], PALETTE.vfr);
        assert_eq!(engine.state(low), Some(EffectState::Preempted));
    }

    #[test]
    fn test_partial_preemption_keeps_remaining_stations() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let wide = trigger
            .trigger_effect(EffectKind::Static, &["KDEN", "KBOS"], 5, 100, solid(RED))
            .unwrap();
        engine.advance(0, &table.snapshot(), NORMAL);
        trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 10, 2, solid(BLUE))
            .unwrap();

        let frame = engine.advance(1, &table.snapshot(), NORMAL).to_vec();
        assert_eq!(&frame[..2], &[BLUE, RED]);
        assert_eq!(engine.state(wide), Some(EffectState::Running));

        // KDEN was claimed, so it falls back to its base color afterwards
        let frame = engine.advance(3, &table.snapshot(), NORMAL).to_vec();
        assert_eq!(&frame[..2], &[PALETTE.vfr, RED]);
    }

    #[test]
    fn test_equal_priority_newest_wins() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let older = trigger
            .trigger_effect(EffectKind::Static, &["KSEA"], 20, 50, solid(RED))
            .unwrap();
        let newer = trigger
            .trigger_effect(EffectKind::Static, &["KSEA"], 20, 50, solid(BLUE))
            .unwrap();
        assert!(newer > older);

        assert_eq!(engine.advance(0, &table.snapshot(), NORMAL)[3], BLUE);
    }

    #[test]
    fn test_output_is_deterministic() {
        let table = table();
        let run = || {
            let queue: TriggerQueue<8> = TriggerQueue::new();
            let trigger = queue.trigger(&table);
            let mut engine: EffectEngine<4, 8> =
                EffectEngine::new(EngineConfig::default(), queue.receiver());
            trigger
                .trigger_effect(EffectKind::Wipe, &STATIONS, 10, 12, solid(WHITE))
                .unwrap();
            trigger
                .trigger_effect(EffectKind::Pulse, &["KBOS"], 30, 60, EffectParams::default())
                .unwrap();
            trigger
                .trigger(
                    EffectRequest::new(
                        EffectKind::Fade,
                        table.station_set(&["KSEA"]).unwrap(),
                        40,
                        20,
                    )
                    .starting_at(5),
                )
                .unwrap();

            (0..80)
                .map(|tick| engine.advance(tick, &table.snapshot(), NORMAL).to_vec())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_duration_is_clamped() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let config = EngineConfig {
            max_effect_ticks: 50,
            ..EngineConfig::default()
        };
        let mut engine: EffectEngine<4, 8> = EffectEngine::new(config, queue.receiver());

        let id = queue
            .trigger(&table)
            .trigger_effect(EffectKind::Static, &["KBOS"], 10, u32::MAX, solid(RED))
            .unwrap();

        let mut running_ticks = 0;
        for tick in 0..200 {
            engine.advance(tick, &table.snapshot(), NORMAL);
            if engine.state(id) == Some(EffectState::Running) {
                running_ticks += 1;
                assert!(tick < 50);
            }
        }
        assert_eq!(running_ticks, 50);
        assert_eq!(engine.state(id), Some(EffectState::Completed));
    }

    #[test]
    fn test_delayed_start_stays_pending() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let request = EffectRequest::new(
            EffectKind::Static,
            table.station_set(&["KXXX"]).unwrap(),
            10,
            5,
        )
        .with_params(solid(BLUE))
        .starting_at(3);
        let id = queue.trigger(&table).trigger(request).unwrap();

        assert_eq!(engine.advance(0, &table.snapshot(), NORMAL)[2], PALETTE.ifr);
        assert_eq!(engine.state(id), Some(EffectState::Pending));
        assert_eq!(engine.advance(3, &table.snapshot(), NORMAL)[2], BLUE);
        assert_eq!(engine.state(id), Some(EffectState::Running));
        engine.advance(8, &table.snapshot(), NORMAL);
        assert_eq!(engine.state(id), Some(EffectState::Completed));
    }

    #[test]
    fn test_explicit_stop() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let id = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 10, 500, solid(RED))
            .unwrap();
        engine.advance(0, &table.snapshot(), NORMAL);
        trigger.stop(id).unwrap();

        assert_eq!(engine.advance(1, &table.snapshot(), NORMAL)[0], PALETTE.vfr);
        assert_eq!(engine.state(id), Some(EffectState::Completed));

        trigger
            .trigger_effect(EffectKind::Static, &["KBOS"], 10, 500, solid(RED))
            .unwrap();
        engine.advance(2, &table.snapshot(), NORMAL);
        assert_eq!(engine.active_count(), 1);
        trigger.stop_all().unwrap();
        engine.advance(3, &table.snapshot(), NORMAL);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_fallback_station_does_not_affect_others() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        let result = table.set_station("KXXX", "BOGUS", Some(0x0F00_0000), StationFlags::default());
        assert!(matches!(result, Err(CoreError::InvalidStationData { .. })));

        let frame = engine.advance(0, &table.snapshot(), NORMAL).to_vec();
        assert_eq!(frame[2], PALETTE.no_data);
        assert_eq!(frame[0], PALETTE.vfr);
        assert_eq!(frame[1], PALETTE.mvfr);
        assert_eq!(frame[3], PALETTE.lifr);
        assert_eq!(engine.stats().fallback_stations, 1);
    }

    #[test]
    fn test_safe_state_drops_effects_and_renders_neutral() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let config = EngineConfig::default();
        let mut engine: EffectEngine<4, 8> = EffectEngine::new(config, queue.receiver());

        let id = trigger
            .trigger_effect(EffectKind::Static, &STATIONS, 10, 500, solid(RED))
            .unwrap();
        engine.advance(0, &table.snapshot(), NORMAL);

        let tripped = SafeState {
            epoch: 1,
            active: true,
        };
        let frame = engine.advance(1, &table.snapshot(), tripped).to_vec();
        assert_eq!(frame, vec![config.neutral; 4]);
        assert_eq!(engine.state(id), Some(EffectState::Preempted));

        let refused = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 10, 500, solid(RED))
            .unwrap();
        engine.advance(2, &table.snapshot(), tripped);
        assert_eq!(engine.state(refused), Some(EffectState::Preempted));

        let recovered = SafeState {
            epoch: 1,
            active: false,
        };
        let frame = engine.advance(3, &table.snapshot(), recovered).to_vec();
        assert_eq!(frame, base_frame());
    }

    #[test]
    fn test_arena_is_bounded() {
        let table = table();
        let queue: TriggerQueue<32> = TriggerQueue::new();
        let trigger = queue.trigger(&table);
        let mut engine: EffectEngine<4, 32> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        // descending priorities, so no effect claims another's station
        let ids: Vec<_> = (0..=MAX_EFFECTS)
            .map(|index| {
                let priority = u8::try_from(100 - index).unwrap();
                trigger
                    .trigger_effect(EffectKind::Static, &["KDEN"], priority, 100, solid(RED))
                    .unwrap()
            })
            .collect();
        engine.advance(0, &table.snapshot(), NORMAL);

        assert_eq!(engine.active_count(), MAX_EFFECTS);
        assert_eq!(engine.state(ids[MAX_EFFECTS]), Some(EffectState::Preempted));
    }

    #[test]
    fn test_queue_full_allocates_no_id() {
        let table = table();
        let queue: TriggerQueue<1> = TriggerQueue::new();
        let trigger = queue.trigger(&table);

        let first = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 1, 10, EffectParams::default())
            .unwrap();
        let full =
            trigger.trigger_effect(EffectKind::Static, &["KDEN"], 1, 10, EffectParams::default());
        assert!(matches!(full, Err(CoreError::QueueFull)));

        assert!(queue.try_receive().is_some());
        let second = trigger
            .trigger_effect(EffectKind::Static, &["KDEN"], 1, 10, EffectParams::default())
            .unwrap();
        assert_eq!(second.get(), first.get() + 1);
    }

    #[test]
    fn test_present_writes_under_lease() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let arbiter = ResourceArbiter::new(&[LED_CHANNEL]).unwrap();
        let mut driver = RecordingDriver::default();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());
        engine.advance(0, &table.snapshot(), NORMAL);

        engine.present(&arbiter, &mut driver, Instant::from_millis(0)).unwrap();
        assert_eq!(driver.frames, vec![base_frame()]);
        assert_eq!(arbiter.live_leases(), 0);

        let held = arbiter
            .try_acquire(LED_CHANNEL, OwnerId(42), Instant::from_millis(0))
            .unwrap();
        let busy = engine.present(&arbiter, &mut driver, Instant::from_millis(0));
        assert!(matches!(busy, Err(CoreError::Busy { .. })));
        assert_eq!(driver.frames.len(), 1);
        drop(held);

        driver.fail = true;
        let failed = engine.present(&arbiter, &mut driver, Instant::from_millis(0));
        assert_eq!(failed, Err(CoreError::Driver(DriverError("nack"))));
        assert_eq!(arbiter.live_leases(), 0);
    }

    #[test]
    fn test_extreme_parameters_stay_bounded() {
        const KINDS: [EffectKind; 7] = [
            EffectKind::Static,
            EffectKind::Blink,
            EffectKind::Fade,
            EffectKind::Wipe,
            EffectKind::Lightning,
            EffectKind::Pulse,
            EffectKind::HeatMap,
        ];

        let table = table();
        let queue: TriggerQueue<16> = TriggerQueue::new();
        let config = EngineConfig {
            max_effect_ticks: 20,
            ..EngineConfig::default()
        };
        let mut engine: EffectEngine<4, 16> = EffectEngine::new(config, queue.receiver());
        let stations = table.all();

        // falling priorities, delayed ones below every immediate one, so no
        // start preempts anything
        let mut priority = 200;
        let mut ids = Vec::new();
        for kind in KINDS {
            let params = EffectParams::default()
                .with_period(u32::MAX)
                .with_value(u8::MAX);
            let immediate =
                EffectRequest::new(kind, stations, priority, u32::MAX).with_params(params);
            let delayed = EffectRequest {
                priority: priority - 100,
                ..immediate
            }
            .starting_at(u64::MAX);
            priority -= 2;
            ids.push(queue.push_trigger(immediate).unwrap());
            ids.push(queue.push_trigger(delayed).unwrap());
        }

        // admitted at tick 0; delayed starts are capped at tick 20
        for tick in 0..=40 {
            let frame = engine.advance(tick, &table.snapshot(), NORMAL);
            assert_eq!(frame.len(), STATIONS.len());
            if tick >= 20 {
                for &id in ids.iter().step_by(2) {
                    assert_ne!(engine.state(id), Some(EffectState::Running));
                }
            }
        }

        for id in ids {
            assert_eq!(engine.state(id), Some(EffectState::Completed));
        }
        assert_eq!(engine.stats().completed, 14);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_period_is_clamped_to_effect_cap() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let config = EngineConfig {
            max_effect_ticks: 8,
            ..EngineConfig::default()
        };
        let mut engine: EffectEngine<4, 8> = EffectEngine::new(config, queue.receiver());

        queue
            .trigger(&table)
            .trigger_effect(
                EffectKind::Blink,
                &["KDEN"],
                10,
                8,
                solid(WHITE).with_period(u32::MAX),
            )
            .unwrap();

        let colors: Vec<Rgb> = (0..8)
            .map(|tick| engine.advance(tick, &table.snapshot(), NORMAL)[0])
            .collect();
        // one full 8-tick cycle: on for half, off for half
        assert_eq!(colors, [[WHITE; 4], [BLACK; 4]].concat());
    }

    #[test]
    fn test_heat_map_colors_station() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        queue
            .trigger(&table)
            .trigger_effect(
                EffectKind::HeatMap,
                &["KSEA"],
                10,
                5,
                EffectParams::default().with_value(192),
            )
            .unwrap();

        let frame = engine.advance(0, &table.snapshot(), NORMAL).to_vec();
        let mut expected = base_frame();
        expected[3] = heat_color(192);
        assert_eq!(frame, expected);
    }

    #[test]
    fn test_effect_intensity_scales_its_output() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let mut engine: EffectEngine<4, 8> =
            EffectEngine::new(EngineConfig::default(), queue.receiver());

        queue
            .trigger(&table)
            .trigger_effect(
                EffectKind::Static,
                &["KDEN"],
                10,
                5,
                solid(WHITE).with_intensity(128),
            )
            .unwrap();

        let frame = engine.advance(0, &table.snapshot(), NORMAL).to_vec();
        assert_eq!(frame[0], scale_color(WHITE, 128));
        assert_eq!(frame[1..], base_frame()[1..]);
    }

    #[test]
    fn test_brightness_scales_whole_frame() {
        let table = table();
        let queue: TriggerQueue<8> = TriggerQueue::new();
        let config = EngineConfig {
            brightness: 64,
            ..EngineConfig::default()
        };
        let mut engine: EffectEngine<4, 8> = EffectEngine::new(config, queue.receiver());

        let dimmed: Vec<Rgb> = base_frame()
            .into_iter()
            .map(|color| scale_color(color, 64))
            .collect();
        assert_eq!(engine.advance(0, &table.snapshot(), NORMAL), dimmed.as_slice());

        queue.trigger(&table).set_brightness(u8::MAX).unwrap();
        assert_eq!(engine.advance(1, &table.snapshot(), NORMAL), base_frame().as_slice());
        assert_eq!(engine.brightness(), u8::MAX);

        queue.trigger(&table).set_brightness(0).unwrap();
        assert_eq!(engine.advance(2, &table.snapshot(), NORMAL), &[BLACK; 4]);
    }
}
