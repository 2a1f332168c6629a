mod test_irradiance_scenarios {
    use crate::core::solar::clearness_index::ClearnessIndexCalculator;
    use crate::core::solar::plane_projection::{project_to_plane, ResolvedPanel, DEFAULT_ALBEDO};
    use crate::core::solar::diffuse_fraction::DiffuseFractionEstimator;
    use crate::core::solar::sun_geometry::{sun_times, Location, TimeReference, TrackingMode};
    use crate::core::upsampling::temporal_upsampler::{synthesize_hourly, IrradianceSeries};
    use crate::time_index::{day_of_year, hours_of_day, parse_timestamp, FrequencyTag};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn panel(tilt: f64, azimuth: f64, tracking: TrackingMode) -> ResolvedPanel {
        ResolvedPanel {
            tilt,
            azimuth,
            tracking,
            albedo: DEFAULT_ALBEDO,
        }
    }

    #[rstest]
    fn test_july_monthly_mean_at_45_north() {
        let location = Location::new(45., 0.).unwrap();
        let series =
            IrradianceSeries::new(vec![parse_timestamp("2015-07-01").unwrap()], vec![200.])
                .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Monthly, None).unwrap();

        assert_eq!(hourly.len(), 24);
        assert_relative_eq!(
            hourly.global_horizontal.iter().sum::<f64>(),
            200. * 24.,
            max_relative = 1e-12
        );

        let sun = sun_times(&location, day_of_year(&hourly.timestamps[0]));
        for (hour, value) in hourly.global_horizontal.iter().enumerate() {
            let hour = hour as f64;
            if hour + 1. <= sun.sunrise || hour >= sun.sunset {
                assert_eq!(*value, 0., "hour {hour}");
            }
        }
        assert!(hourly.global_horizontal[12] > 0.);
    }

    #[rstest]
    fn test_utc_daily_cell_far_east_wraps_midnight() {
        let location = Location::new(40., 170.)
            .unwrap()
            .with_time_reference(TimeReference::Utc);
        let series =
            IrradianceSeries::new(vec![parse_timestamp("2015-06-21").unwrap()], vec![250.])
                .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Daily, None).unwrap();
        assert_eq!(hourly.len(), 24);
        assert_relative_eq!(
            hourly.global_horizontal.iter().sum::<f64>(),
            250. * 24.,
            max_relative = 1e-12
        );

        // around 11h20 ahead of UTC: sunrise near 17:10, sunset near 08:05
        let sun = sun_times(&location, day_of_year(&hourly.timestamps[0]));
        assert!(sun.wraps_midnight());
        assert_eq!(sun.sunrise_hour(), 17);
        assert_eq!(sun.sunset_hour(), 8);
        for hour in 9..17 {
            assert_eq!(hourly.global_horizontal[hour], 0., "hour {hour}");
        }
        for hour in [18, 23, 0, 2, 7] {
            assert!(hourly.global_horizontal[hour] > 0., "hour {hour}");
        }

        let fractions = DiffuseFractionEstimator::new(location)
            .estimate(&hourly.timestamps, &hourly.global_horizontal);
        for (hour, (fraction, ghi)) in fractions
            .iter()
            .zip(&hourly.global_horizontal)
            .enumerate()
        {
            if *ghi > 0. {
                let fraction = fraction.unwrap_or_else(|| panic!("hour {hour} has no estimate"));
                assert!((0. ..=1.).contains(&fraction), "hour {hour}: {fraction}");
            } else {
                assert_eq!(*fraction, None, "hour {hour}");
            }
        }

        let components = hourly.horizontal_components(&location);
        let facing_equator = panel(30., 180., TrackingMode::Fixed);
        let afternoon = project_to_plane(
            components[2].0,
            components[2].1,
            &location,
            &facing_equator,
            &hourly.timestamps[2],
        );
        assert!(afternoon.total() > 0.);
        let night = project_to_plane(
            components[12].0,
            components[12].1,
            &location,
            &facing_equator,
            &hourly.timestamps[12],
        );
        assert_eq!(night.total(), 0.);
    }

    #[rstest]
    fn test_polar_night_synthesises_no_irradiance() {
        let location = Location::new(80., 15.).unwrap();
        let series = IrradianceSeries::new(
            vec![
                parse_timestamp("2015-12-21").unwrap(),
                parse_timestamp("2015-12-22").unwrap(),
            ],
            vec![10., 12.],
        )
        .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Daily, None).unwrap();
        assert_eq!(hourly.len(), 48);
        assert!(hourly.global_horizontal.iter().all(|value| *value == 0.));
    }

    #[rstest]
    #[case(11)]
    #[case(12)]
    fn test_horizontal_panel_at_equator_matches_horizontal_input(#[case] hour: u32) {
        let location = Location::new(0., 0.).unwrap();
        let timestamp = NaiveDate::from_ymd_opt(2015, 3, 20)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        let irradiance = project_to_plane(
            550.,
            250.,
            &location,
            &panel(0., 180., TrackingMode::Fixed),
            &timestamp,
        );
        assert_relative_eq!(irradiance.direct, 550., epsilon = 1e-9);
        assert_relative_eq!(irradiance.diffuse, 250., epsilon = 1e-9);
        assert_relative_eq!(irradiance.total(), 800., epsilon = 1e-9);
    }

    #[rstest]
    #[case(45., "2015-06-21")]
    #[case(45., "2015-12-21")]
    #[case(-33., "2015-09-23")]
    #[case(60., "2015-04-10")]
    fn test_two_axis_tracking_collects_at_least_as_much_as_fixed(
        #[case] latitude: f64,
        #[case] date: &str,
    ) {
        let location = Location::new(latitude, 10.).unwrap();
        let date = parse_timestamp(date).unwrap().date();
        let fixed_panels = [
            panel(30., 180., TrackingMode::Fixed),
            panel(60., 120., TrackingMode::Fixed),
            panel(0., 180., TrackingMode::Fixed),
            panel(25., 200., TrackingMode::SingleAxis),
        ];
        let tracker = panel(0., 180., TrackingMode::TwoAxis);

        for (timestamp, (direct, diffuse)) in
            hours_of_day(date).zip((0..24).map(|hour| (hour as f64 * 20., 60. + hour as f64)))
        {
            let tracked = project_to_plane(direct, diffuse, &location, &tracker, &timestamp);
            for fixed_panel in &fixed_panels {
                let fixed = project_to_plane(direct, diffuse, &location, fixed_panel, &timestamp);
                assert!(
                    tracked.total() >= fixed.total() - 1e-9,
                    "{timestamp}: two-axis {} < {:?} {}",
                    tracked.total(),
                    fixed_panel,
                    fixed.total()
                );
            }
        }
    }

    #[rstest]
    fn test_clearness_index_is_undefined_at_night() {
        let calculator = ClearnessIndexCalculator::new(Location::new(51.5, 0.).unwrap());
        let midnight = parse_timestamp("2015-01-15 00:00").unwrap();
        assert_eq!(calculator.extraterrestrial(&midnight), 0.);
        assert_eq!(calculator.clearness_index(&midnight, 20.), None);

        let noon = parse_timestamp("2015-01-15 12:00").unwrap();
        let kt = calculator.clearness_index(&noon, 150.).unwrap();
        assert!(kt > 0. && kt <= 1.);
    }
}
