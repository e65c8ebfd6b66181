use crate::types::Appliance;
use std::num::ParseIntError;
use thiserror::Error;

pub const EPC_NORMAL_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY: i64 = 224;
pub const EPC_REVERSE_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY: i64 = 227;
pub const EPC_COEFFICIENT: i64 = 211;
pub const EPC_CUMULATIVE_ELECTRIC_ENERGY_UNIT: i64 = 225;
pub const EPC_CUMULATIVE_ELECTRIC_ENERGY_EFFECTIVE_DIGITS: i64 = 215;
pub const EPC_MEASURED_INSTANTANEOUS: i64 = 231;

const EXPECTED_PROPERTY_COUNT: usize = 6;

#[derive(Debug, Error)]
pub enum SmartMeterError {
    #[error("missing smart-meter data for '{device}'")]
    MissingSmartMeter { device: String },
    #[error("unexpected property count for '{device}': expected 6, got {count}")]
    UnexpectedPropertyCount { device: String, count: usize },
    #[error("invalid value '{value}' for epc {epc}: {source}")]
    InvalidValue {
        epc: i64,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid unit code value: {0}")]
    InvalidUnitCode(i64),
    #[error("property epc {0} missing from smart-meter data")]
    MissingProperty(i64),
}

/// Decoded smart meter reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyReading {
    pub normal_energy: i64,
    pub reverse_energy: i64,
    pub coefficient: i64,
    pub energy_unit: f64,
    pub effective_digits: i64,
    pub measured_instantaneous: i64,
}

impl EnergyReading {
    /// Net cumulative energy in kWh
    pub fn cumulative_electric_energy(&self) -> f64 {
        (self.normal_energy as f64 - self.reverse_energy as f64)
            * self.coefficient as f64
            * self.energy_unit
    }
}

/// What a single property contributes to the reading
#[derive(Debug, Clone, Copy, PartialEq)]
enum Property {
    NormalEnergy(i64),
    ReverseEnergy(i64),
    Coefficient(i64),
    EnergyUnit(f64),
    EffectiveDigits(i64),
    MeasuredInstantaneous(i64),
    Ignored,
}

impl Property {
    fn decode(epc: i64, val: &str) -> Result<Self, SmartMeterError> {
        let property = match epc {
            EPC_NORMAL_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY => {
                Property::NormalEnergy(parse_int(epc, val)?)
            }
            EPC_REVERSE_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY => {
                Property::ReverseEnergy(parse_int(epc, val)?)
            }
            EPC_COEFFICIENT => Property::Coefficient(parse_int(epc, val)?),
            EPC_CUMULATIVE_ELECTRIC_ENERGY_UNIT => {
                Property::EnergyUnit(energy_unit_scale(parse_int(epc, val)?)?)
            }
            EPC_CUMULATIVE_ELECTRIC_ENERGY_EFFECTIVE_DIGITS => {
                Property::EffectiveDigits(parse_int(epc, val)?)
            }
            EPC_MEASURED_INSTANTANEOUS => Property::MeasuredInstantaneous(parse_int(epc, val)?),
            _ => Property::Ignored,
        };
        Ok(property)
    }
}

fn parse_int(epc: i64, val: &str) -> Result<i64, SmartMeterError> {
    val.parse().map_err(|source| SmartMeterError::InvalidValue {
        epc,
        value: val.to_string(),
        source,
    })
}

/// Maps the cumulative energy unit code to its kWh multiplier
pub fn energy_unit_scale(code: i64) -> Result<f64, SmartMeterError> {
    let scale = match code {
        0x00 => 1.0,
        0x01 => 0.1,
        0x02 => 0.01,
        0x03 => 0.001,
        0x04 => 0.0001,
        0x0A => 10.0,
        0x0B => 100.0,
        0x0C => 1000.0,
        0x0D => 10000.0,
        _ => return Err(SmartMeterError::InvalidUnitCode(code)),
    };
    Ok(scale)
}

/// Returns only the appliances tagged as smart meters
pub fn smart_meters(appliances: &[Appliance]) -> impl Iterator<Item = &Appliance> {
    appliances.iter().filter(|appliance| appliance.is_smart_meter())
}

/// Decodes the smart meter properties of `appliance`.
///
/// Fails on the first property that does not parse; a reading is either
/// complete or not produced at all.
pub fn energy_reading(appliance: &Appliance) -> Result<EnergyReading, SmartMeterError> {
    let device = &appliance.device.name;
    let smart_meter =
        appliance
            .smart_meter
            .as_ref()
            .ok_or_else(|| SmartMeterError::MissingSmartMeter {
                device: device.clone(),
            })?;

    let properties = &smart_meter.echonetlite_properties;
    if properties.len() != EXPECTED_PROPERTY_COUNT {
        return Err(SmartMeterError::UnexpectedPropertyCount {
            device: device.clone(),
            count: properties.len(),
        });
    }

    let mut normal_energy = None;
    let mut reverse_energy = None;
    let mut coefficient = None;
    let mut energy_unit = None;
    let mut effective_digits = None;
    let mut measured_instantaneous = None;

    for property in properties {
        match Property::decode(property.epc, &property.val)? {
            Property::NormalEnergy(v) => normal_energy = Some(v),
            Property::ReverseEnergy(v) => reverse_energy = Some(v),
            Property::Coefficient(v) => coefficient = Some(v),
            Property::EnergyUnit(v) => energy_unit = Some(v),
            Property::EffectiveDigits(v) => effective_digits = Some(v),
            Property::MeasuredInstantaneous(v) => measured_instantaneous = Some(v),
            Property::Ignored => {}
        }
    }

    Ok(EnergyReading {
        normal_energy: required(
            normal_energy,
            EPC_NORMAL_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY,
        )?,
        reverse_energy: required(
            reverse_energy,
            EPC_REVERSE_DIRECTION_CUMULATIVE_ELECTRIC_ENERGY,
        )?,
        coefficient: required(coefficient, EPC_COEFFICIENT)?,
        energy_unit: required(energy_unit, EPC_CUMULATIVE_ELECTRIC_ENERGY_UNIT)?,
        effective_digits: required(
            effective_digits,
            EPC_CUMULATIVE_ELECTRIC_ENERGY_EFFECTIVE_DIGITS,
        )?,
        measured_instantaneous: required(measured_instantaneous, EPC_MEASURED_INSTANTANEOUS)?,
    })
}

fn required<T>(value: Option<T>, epc: i64) -> Result<T, SmartMeterError> {
    value.ok_or(SmartMeterError::MissingProperty(epc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Device, EchonetliteProperty, SmartMeter};
    use tokio_test::{assert_err, assert_ok};

    fn property(epc: i64, val: &str) -> EchonetliteProperty {
        EchonetliteProperty {
            name: format!("epc_{epc}"),
            epc,
            val: val.to_string(),
            updated_at: None,
        }
    }

    fn smart_meter_appliance(properties: Vec<EchonetliteProperty>) -> Appliance {
        Appliance {
            id: "appliance-1".to_string(),
            appliance_type: "EL_SMART_METER".to_string(),
            device: Device {
                name: "Remo E lite".to_string(),
                id: "device-1".to_string(),
                ..Default::default()
            },
            smart_meter: Some(SmartMeter {
                echonetlite_properties: properties,
            }),
            ..Default::default()
        }
    }

    fn sample_properties() -> Vec<EchonetliteProperty> {
        vec![
            property(211, "1"),
            property(215, "6"),
            property(224, "50851"),
            property(225, "1"),
            property(227, "11"),
            property(231, "568"),
        ]
    }

    #[test]
    fn test_energy_reading() {
        let reading = energy_reading(&smart_meter_appliance(sample_properties())).unwrap();

        assert_eq!(
            reading,
            EnergyReading {
                normal_energy: 50851,
                reverse_energy: 11,
                coefficient: 1,
                energy_unit: 0.1,
                effective_digits: 6,
                measured_instantaneous: 568,
            }
        );
        assert!((reading.cumulative_electric_energy() - 5084.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_energy_of_large_readings() {
        let mut properties = sample_properties();
        properties[0] = property(211, "10");
        properties[2] = property(224, &i64::MAX.to_string());
        properties[4] = property(227, &i64::MIN.to_string());

        let reading = energy_reading(&smart_meter_appliance(properties)).unwrap();
        let energy = reading.cumulative_electric_energy();

        assert!(energy.is_finite());
        assert!((energy - 2.0 * i64::MAX as f64).abs() / energy < 1e-12);
    }

    #[test]
    fn test_energy_reading_ignores_property_order() {
        let mut properties = sample_properties();
        properties.reverse();

        let reading = energy_reading(&smart_meter_appliance(properties)).unwrap();
        assert_eq!(reading.normal_energy, 50851);
        assert_eq!(reading.measured_instantaneous, 568);
    }

    #[test]
    fn test_missing_smart_meter() {
        let mut appliance = smart_meter_appliance(sample_properties());
        appliance.smart_meter = None;

        let err = energy_reading(&appliance).unwrap_err();
        assert!(matches!(err, SmartMeterError::MissingSmartMeter { ref device } if device == "Remo E lite"));
    }

    #[test]
    fn test_unexpected_property_count() {
        let mut properties = sample_properties();
        properties.pop();
        let err = energy_reading(&smart_meter_appliance(properties)).unwrap_err();
        assert!(matches!(
            err,
            SmartMeterError::UnexpectedPropertyCount { count: 5, .. }
        ));

        let mut properties = sample_properties();
        properties.push(property(232, "1"));
        let err = energy_reading(&smart_meter_appliance(properties)).unwrap_err();
        assert!(matches!(
            err,
            SmartMeterError::UnexpectedPropertyCount { count: 7, .. }
        ));
    }

    #[test]
    fn test_invalid_unit_code() {
        let mut properties = sample_properties();
        properties[3] = property(225, "99");

        let err = energy_reading(&smart_meter_appliance(properties)).unwrap_err();
        assert_eq!(err.to_string(), "invalid unit code value: 99");
    }

    #[test]
    fn test_invalid_value_fails_fast() {
        let mut properties = sample_properties();
        properties[0] = property(211, "one");
        // A later bad unit code is never reached
        properties[3] = property(225, "99");

        let err = energy_reading(&smart_meter_appliance(properties)).unwrap_err();
        assert!(matches!(
            err,
            SmartMeterError::InvalidValue { epc: 211, ref value, .. } if value == "one"
        ));
    }

    #[test]
    fn test_unknown_code_leaves_reading_incomplete() {
        let mut properties = sample_properties();
        properties[5] = property(232, "100");

        let err = energy_reading(&smart_meter_appliance(properties)).unwrap_err();
        assert!(matches!(
            err,
            SmartMeterError::MissingProperty(EPC_MEASURED_INSTANTANEOUS)
        ));
    }

    #[test]
    fn test_energy_unit_scale_table() {
        let table = [
            (0, 1.0),
            (1, 0.1),
            (2, 0.01),
            (3, 0.001),
            (4, 0.0001),
            (10, 10.0),
            (11, 100.0),
            (12, 1000.0),
            (13, 10000.0),
        ];
        for (code, scale) in table {
            assert_eq!(assert_ok!(energy_unit_scale(code)), scale);
        }
        assert_err!(energy_unit_scale(5));
        assert_err!(energy_unit_scale(-1));
    }

    #[test]
    fn test_smart_meters_filter() {
        let mut aircon = smart_meter_appliance(vec![]);
        aircon.appliance_type = "AC".to_string();
        let mut light = smart_meter_appliance(vec![]);
        light.appliance_type = "LIGHT".to_string();
        let meter = smart_meter_appliance(sample_properties());

        let appliances = vec![aircon, meter, light];
        let meters: Vec<_> = smart_meters(&appliances).collect();

        assert_eq!(meters.len(), 1);
        assert_eq!(meters[0].appliance_type, "EL_SMART_METER");
    }
}
