use transfer_models::FeatureVector;

/// Raw behavioral signals, already defaulted by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput {
    pub avg_amount_7d: f64,
    pub tx_velocity_1h: f64,
    pub device_change_freq: f64,
    pub current_hour: u32,
    pub usual_hour_mean: f64,
}

pub fn build_features(input: &FeatureInput) -> FeatureVector {
    FeatureVector {
        avg_amount_7d: input.avg_amount_7d,
        tx_velocity_1h: input.tx_velocity_1h,
        device_change_freq: input.device_change_freq,
        time_of_day_deviation: (f64::from(input.current_hour) - input.usual_hour_mean).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_deviation_is_absolute_distance() {
        let early = build_features(&FeatureInput {
            avg_amount_7d: 120.0,
            tx_velocity_1h: 2.0,
            device_change_freq: 1.0,
            current_hour: 3,
            usual_hour_mean: 12.0,
        });
        assert_eq!(early.time_of_day_deviation, 9.0);
        assert_eq!(early.avg_amount_7d, 120.0);
        assert_eq!(early.tx_velocity_1h, 2.0);

        let late = build_features(&FeatureInput {
            current_hour: 21,
            ..FeatureInput {
                avg_amount_7d: 0.0,
                tx_velocity_1h: 0.0,
                device_change_freq: 0.0,
                current_hour: 0,
                usual_hour_mean: 12.0,
            }
        });
        assert_eq!(late.time_of_day_deviation, 9.0);
    }
}
