mod tests {
    use std::sync::Barrier;
    use std::thread;

    use sectional_composer::config::CategoryPalette;
    use sectional_composer::error::{CoreError, InvalidData};
    use sectional_composer::station::{FlightCategory, StationFlags, StationSet, StationTable};

    const STATIONS: [&str; 4] = ["KDEN", "KBOS", "KXXX", "KSEA"];

    fn table() -> StationTable<8> {
        StationTable::new(&STATIONS, CategoryPalette::DEFAULT).unwrap()
    }

    #[test]
    fn test_flight_category_parse() {
        assert_eq!(FlightCategory::parse_from_str("VFR"), Some(FlightCategory::Vfr));
        assert_eq!(FlightCategory::parse_from_str(" mvfr "), Some(FlightCategory::Mvfr));
        assert_eq!(FlightCategory::parse_from_str("lifr"), Some(FlightCategory::Lifr));
        assert_eq!(FlightCategory::parse_from_str("NONE"), Some(FlightCategory::None));
        assert_eq!(FlightCategory::parse_from_str("SUNNY"), None);
        assert_eq!(FlightCategory::Ifr.as_str(), "IFR");
    }

    #[test]
    fn test_new_stations_show_no_data() {
        let table = table();
        let state = table.get("KDEN").unwrap();
        assert_eq!(state.category, FlightCategory::None);
        assert_eq!(state.color, CategoryPalette::DEFAULT.no_data);
        assert!(state.valid);
        assert_eq!(table.len(), 4);
        assert_eq!(table.index_of("kbos"), Some(1));
        assert_eq!(table.id(3), Some("KSEA"));
    }

    #[test]
    fn test_table_rejects_too_many_stations() {
        let result = StationTable::<2>::new(&STATIONS, CategoryPalette::DEFAULT);
        assert!(matches!(result, Err(CoreError::Capacity)));
    }

    #[test]
    fn test_set_station_uses_category_color() {
        let table = table();
        table
            .set_station("KDEN", "IFR", None, StationFlags::default())
            .unwrap();
        let state = table.get("KDEN").unwrap();
        assert_eq!(state.category, FlightCategory::Ifr);
        assert_eq!(state.color, CategoryPalette::DEFAULT.ifr);
    }

    #[test]
    fn test_set_station_color_override() {
        let table = table();
        table
            .set_station("KBOS", "VFR", Some(0x12_34_56), StationFlags::default())
            .unwrap();
        let state = table.get("KBOS").unwrap();
        assert_eq!((state.color.r, state.color.g, state.color.b), (0x12, 0x34, 0x56));
    }

    #[test]
    fn test_invalid_data_substitutes_fallback() {
        let table = table();
        table
            .set_station("KDEN", "VFR", None, StationFlags::default())
            .unwrap();

        let result = table.set_station("KXXX", "BOGUS", Some(0x0100_0000), StationFlags::default());
        assert_eq!(
            result,
            Err(CoreError::InvalidStationData {
                reason: InvalidData::Category
            })
        );

        let fallback = table.get("KXXX").unwrap();
        assert!(!fallback.valid);
        assert_eq!(fallback.color, CategoryPalette::DEFAULT.no_data);

        // other stations are unaffected
        let kden = table.get("KDEN").unwrap();
        assert!(kden.valid);
        assert_eq!(kden.color, CategoryPalette::DEFAULT.vfr);
    }

    #[test]
    fn test_invalid_color_alone_is_reported() {
        let table = table();
        let result = table.set_station("KSEA", "MVFR", Some(0xFFFF_FFFF), StationFlags::default());
        assert_eq!(
            result,
            Err(CoreError::InvalidStationData {
                reason: InvalidData::Color
            })
        );
        assert!(!table.get("KSEA").unwrap().valid);
    }

    #[test]
    fn test_unknown_station() {
        let table = table();
        let result = table.set_station("EGLL", "VFR", None, StationFlags::default());
        assert_eq!(result, Err(CoreError::UnknownStation));
        assert!(matches!(
            table.station_set(&["KDEN", "EGLL"]),
            Err(CoreError::UnknownStation)
        ));
    }

    #[test]
    fn test_revision_counts_updates() {
        let table = table();
        assert_eq!(table.revision(), 0);
        table
            .set_classified("KDEN", FlightCategory::Lifr, None, StationFlags::default())
            .unwrap();
        let _ = table.set_station("KBOS", "??", None, StationFlags::default());
        assert_eq!(table.revision(), 2);
    }

    #[test]
    fn test_concurrent_updates_never_tear() {
        let table = table();
        let barrier = Barrier::new(3);
        let palette = CategoryPalette::DEFAULT;

        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..500 {
                    table
                        .set_station("KDEN", "VFR", None, StationFlags::default())
                        .unwrap();
                }
            });
            s.spawn(|| {
                barrier.wait();
                for _ in 0..500 {
                    table
                        .set_station("KDEN", "LIFR", None, StationFlags::default())
                        .unwrap();
                }
            });
            s.spawn(|| {
                barrier.wait();
                for _ in 0..500 {
                    let snapshot = table.snapshot();
                    let state = snapshot[0];
                    assert_eq!(state.color, state.category.color(&palette));
                }
            });
        });

        assert_eq!(table.revision(), 1000);
    }

    #[test]
    fn test_station_set_rank() {
        let set: StationSet = [2, 5, 9, 130].into_iter().collect();
        assert_eq!(set.len(), 4);
        assert_eq!(set.rank(2), 0);
        assert_eq!(set.rank(9), 2);
        assert_eq!(set.rank(130), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 5, 9, 130]);

        let mut other: StationSet = [5, 9].into_iter().collect();
        assert!(set.intersects(&other));
        other.subtract(&set);
        assert!(other.is_empty());
    }
}
