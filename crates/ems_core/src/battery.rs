use crate::error::SimulationError;

/// Absorbs floating-point drift at the 0 / capacity boundaries. Anything
/// further out is a real defect and aborts the run.
const CLAMP_TOLERANCE: f64 = 1e-14;

/// Battery charge state of one electric ambulance, in kWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    level: f64,
    capacity: f64,
}

impl Battery {
    /// A full battery.
    pub fn new(capacity: f64) -> Self {
        Self {
            level: capacity,
            capacity,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.level == self.capacity
    }

    /// kWh still missing to a full charge.
    pub fn deficit(&self) -> f64 {
        self.capacity - self.level
    }

    pub fn drain(&mut self, kwh: f64, ambulance: u32) -> Result<(), SimulationError> {
        self.level -= kwh;
        if self.level.abs() <= CLAMP_TOLERANCE {
            self.level = 0.0;
        }
        if self.level < 0.0 {
            return Err(SimulationError::BatteryDepleted {
                ambulance,
                level: self.level,
            });
        }
        Ok(())
    }

    pub fn charge(&mut self, kwh: f64, ambulance: u32) -> Result<(), SimulationError> {
        self.level += kwh;
        if (self.level - self.capacity).abs() <= CLAMP_TOLERANCE {
            self.level = self.capacity;
        }
        if self.level > self.capacity {
            return Err(SimulationError::BatteryOverfull {
                ambulance,
                level: self.level,
            });
        }
        Ok(())
    }
}

/// kWh consumed by driving `km` kilometers.
pub fn driving_cost_kwh(km: f64, usage_kwh_per_km: f64) -> f64 {
    km * usage_kwh_per_km
}

/// kWh consumed by idling `minutes` at an hourly usage rate.
pub fn idle_cost_kwh(minutes: f64, usage_kwh_per_hour: f64) -> f64 {
    (minutes / 60.0) * usage_kwh_per_hour
}

/// Minutes needed to charge `kwh` at a `speed_kw` charger.
pub fn charging_minutes(kwh: f64, speed_kw: f64) -> f64 {
    (kwh / speed_kw) * 60.0
}

/// kWh gained by a session running from `since` until `now`.
pub fn gained_kwh(since: f64, now: f64, speed_kw: f64) -> f64 {
    ((now - since) / 60.0) * speed_kw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charging_minutes_is_exact() {
        assert_eq!(charging_minutes(123.0, 11.0), 123.0 / 11.0 * 60.0);
    }

    #[test]
    fn idle_cost_is_exact() {
        assert_eq!(idle_cost_kwh(5.21, 5.0), 5.21 / 60.0 * 5.0);
    }

    #[test]
    fn drain_clamps_float_dust_to_zero() {
        let mut battery = Battery::new(150.0);
        battery.drain(150.0 - 5e-15, 0).unwrap();
        assert_eq!(battery.level(), 0.0);
    }

    #[test]
    fn drain_below_zero_is_fatal() {
        let mut battery = Battery::new(150.0);
        let err = battery.drain(150.5, 4).unwrap_err();
        assert!(matches!(err, SimulationError::BatteryDepleted { ambulance: 4, .. }));
    }

    #[test]
    fn charge_clamps_to_capacity() {
        let mut battery = Battery::new(150.0);
        battery.drain(10.0, 0).unwrap();
        battery.charge(10.0 + 5e-15, 0).unwrap();
        assert_eq!(battery.level(), 150.0);
        assert!(battery.is_full());
    }

    #[test]
    fn charge_past_capacity_is_fatal() {
        let mut battery = Battery::new(150.0);
        let err = battery.charge(0.1, 9).unwrap_err();
        assert!(matches!(err, SimulationError::BatteryOverfull { ambulance: 9, .. }));
    }

    #[test]
    fn elapsed_gain_scales_with_speed() {
        assert_eq!(gained_kwh(10.0, 40.0, 20.0), 10.0);
        assert_eq!(gained_kwh(5.0, 5.0, 50.0), 0.0);
    }
}
