// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use anyhow::Error;
use chrono::{NaiveDate, NaiveDateTime};
use controller::{
    error::ErrorKind, Checkin, CheckinDataset, CoordinateTable, TimedCheckins, Timestamp,
    WeatherSeries,
};
use csv::{ReaderBuilder, StringRecord};
use std::{fmt::Display, io::Read, path::Path, str::FromStr};

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn tsv_reader<R: Read>(rdr: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(rdr)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

fn field<T>(record: &StringRecord, index: usize) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    let line = line_of(record);
    let raw = record
        .get(index)
        .ok_or_else(|| ErrorKind::MalformedRecord(line, format!("missing column {}", index)))?;

    raw.trim()
        .parse()
        .map_err(|e| ErrorKind::MalformedRecord(line, format!("column {}: {}", index, e)).into())
}

fn time_field(record: &StringRecord, index: usize) -> Result<Timestamp, Error> {
    let line = line_of(record);
    let raw = record
        .get(index)
        .ok_or_else(|| ErrorKind::MalformedRecord(line, format!("missing column {}", index)))?;

    parse_timestamp(raw)
}

/// Accepts unix seconds or a UTC date/time such as `2013-04-03 18:00:09`
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, Error> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.timestamp());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.timestamp())
        .ok_or_else(|| ErrorKind::InvalidTimestamp(raw.to_string()).into())
}

/// Reads `user \t item \t time` lines
pub fn read_checkins_from<R: Read>(rdr: R) -> Result<TimedCheckins, Error> {
    let mut csv = tsv_reader(rdr);
    let mut checkins = TimedCheckins::new();

    for record in csv.records() {
        let record = record?;
        let user = field(&record, 0)?;
        let item = field(&record, 1)?;
        let time = time_field(&record, 2)?;

        checkins.push(Checkin::new(user, item, time));
    }

    Ok(checkins)
}

pub fn read_checkins(path: impl AsRef<Path>) -> Result<TimedCheckins, Error> {
    let path = path.as_ref();
    let checkins = read_checkins_from(std::fs::File::open(path)?)?;
    log::info!("Loaded {} check-ins from {}", checkins.len(), path.display());

    Ok(checkins)
}

/// Reads `item \t latitude \t longitude` lines
pub fn read_coordinates_from<R: Read>(rdr: R) -> Result<CoordinateTable, Error> {
    let mut csv = tsv_reader(rdr);
    let mut table = CoordinateTable::new();

    for record in csv.records() {
        let record = record?;
        table.insert(field(&record, 0)?, field(&record, 1)?, field(&record, 2)?);
    }

    Ok(table)
}

pub fn read_coordinates(path: impl AsRef<Path>) -> Result<CoordinateTable, Error> {
    let path = path.as_ref();
    let table = read_coordinates_from(std::fs::File::open(path)?)?;
    log::info!("Loaded coordinates of {} items from {}", table.len(), path.display());

    Ok(table)
}

/// Reads `time \t value` lines into slots of `resolution` seconds
pub fn read_weather_from<R: Read>(rdr: R, resolution: i64) -> Result<WeatherSeries, Error> {
    let mut csv = tsv_reader(rdr);
    let mut series = WeatherSeries::new(resolution);

    for record in csv.records() {
        let record = record?;
        series.insert(time_field(&record, 0)?, field(&record, 1)?);
    }

    Ok(series)
}

pub fn read_weather(path: impl AsRef<Path>, resolution: i64) -> Result<WeatherSeries, Error> {
    let path = path.as_ref();
    let series = read_weather_from(std::fs::File::open(path)?, resolution)?;
    log::info!("Loaded {} weather samples from {}", series.len(), path.display());

    Ok(series)
}
