//! Parquet export of the run output tables.
//!
//! One file per table: the patient lifecycle table and the ambulance
//! battery/usage event log. Absent cells export as nulls.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::records::SimRecords;

fn u64_field(name: &'static str) -> Field {
    Field::new(name, DataType::UInt64, false)
}

fn nullable_u64_field(name: &'static str) -> Field {
    Field::new(name, DataType::UInt64, true)
}

fn u32_field(name: &'static str) -> Field {
    Field::new(name, DataType::UInt32, false)
}

fn nullable_u32_field(name: &'static str) -> Field {
    Field::new(name, DataType::UInt32, true)
}

fn f64_field(name: &'static str) -> Field {
    Field::new(name, DataType::Float64, false)
}

fn nullable_f64_field(name: &'static str) -> Field {
    Field::new(name, DataType::Float64, true)
}

fn nullable_bool_field(name: &'static str) -> Field {
    Field::new(name, DataType::Boolean, true)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// One row per emergency call, in arrival order.
pub fn write_patients_parquet<P: AsRef<Path>>(
    path: P,
    records: &SimRecords,
) -> Result<(), Box<dyn Error>> {
    let rows = &records.patients;

    let schema = Schema::new(vec![
        u64_field("patient_id"),
        nullable_f64_field("response_time"),
        f64_field("arrival_time"),
        u32_field("location"),
        nullable_u64_field("ambulances_available"),
        nullable_u64_field("ambulances_not_assignable"),
        nullable_u64_field("assigned_ambulance"),
        nullable_f64_field("waiting_time"),
        nullable_f64_field("driving_time_to_patient"),
        nullable_f64_field("ambulance_arrival_time"),
        nullable_f64_field("on_site_aid_time"),
        nullable_bool_field("to_hospital"),
        nullable_u32_field("hospital"),
        nullable_f64_field("driving_time_to_hospital"),
        nullable_f64_field("drop_off_time"),
        nullable_f64_field("finish_time"),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.patient_id),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.response_time),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.arrival_time),
        )),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|r| r.location),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.ambulances_available),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.ambulances_not_assignable),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.assigned_ambulance),
        )),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.waiting_time))),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.driving_time_to_patient),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.ambulance_arrival_time),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.on_site_aid_time),
        )),
        Arc::new(BooleanArray::from_iter(rows.iter().map(|r| r.to_hospital))),
        Arc::new(UInt32Array::from_iter(rows.iter().map(|r| r.hospital))),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.driving_time_to_hospital),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.drop_off_time),
        )),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.finish_time))),
    ];

    write_record_batch(path, schema, arrays)
}

/// One row per battery usage or charging event.
pub fn write_ambulance_events_parquet<P: AsRef<Path>>(
    path: P,
    records: &SimRecords,
) -> Result<(), Box<dyn Error>> {
    let rows = &records.ambulance_events;

    let schema = Schema::new(vec![
        u64_field("ambulance_id"),
        f64_field("time"),
        nullable_f64_field("battery_before"),
        nullable_f64_field("battery_after"),
        u64_field("use_or_charge"),
        nullable_u64_field("idle_or_driving"),
        nullable_f64_field("idle_time"),
        nullable_u32_field("source"),
        nullable_u32_field("target"),
        nullable_f64_field("driven_km"),
        nullable_f64_field("battery_decrease"),
        nullable_u64_field("charging_type"),
        nullable_u32_field("charging_location"),
        nullable_f64_field("speed_kw"),
        nullable_u64_field("charging_success"),
        nullable_f64_field("waiting_time"),
        nullable_u64_field("charging_interrupted"),
        nullable_f64_field("charging_time"),
        nullable_f64_field("battery_increase"),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.ambulance_id),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.time))),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.battery_before),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.battery_after),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.use_or_charge),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.idle_or_driving),
        )),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.idle_time))),
        Arc::new(UInt32Array::from_iter(rows.iter().map(|r| r.source))),
        Arc::new(UInt32Array::from_iter(rows.iter().map(|r| r.target))),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.driven_km))),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.battery_decrease),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.charging_type),
        )),
        Arc::new(UInt32Array::from_iter(
            rows.iter().map(|r| r.charging_location),
        )),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.speed_kw))),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.charging_success),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.waiting_time),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|r| r.charging_interrupted),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.charging_time),
        )),
        Arc::new(Float64Array::from_iter(
            rows.iter().map(|r| r.battery_increase),
        )),
    ];

    write_record_batch(path, schema, arrays)
}
