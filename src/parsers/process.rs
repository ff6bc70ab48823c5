//! Parser for `cur_pro`/`feeder_pro` output: the laser's process-parameter
//! block, plus the feeder configuration block that shares the same textual
//! shape.
//!
//! Dispatch is a per-line prefix match, each prefix then split on commas into
//! `key: value` parts — no regex, matching the rest of this module's style.
//! A line that matches no known prefix but still looks like `key: value`
//! becomes an extra, so unrecognized telemetry is never silently dropped.

use serde::Serialize;

use super::{normalized_lines, Num};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraKv {
    pub key: String,
    pub value: String,
}

/// Sparse parse of one `cur_pro`/`feeder_pro` exec's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedProcess {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwm_fre: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwm_duty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_fre: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_on: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_off: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_early: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pow_rise: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pow_fall: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pow_early: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pow_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_on: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_off: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_out_speed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_out_len: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_in_speed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_in_len: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_cycle: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_smoothness: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_out_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_in_delay: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extras: Vec<ExtraKv>,
}

/// Parse the body of a `cur_pro`/`feeder_pro` exec into a sparse [`ParsedProcess`].
#[must_use]
pub fn parse_process(text: &str) -> ParsedProcess {
    let lines = normalized_lines(text);
    let mut out = ParsedProcess::default();
    let mut expect_out_len = false;
    let mut expect_in_len = false;

    for line in &lines {
        let lower = line.to_lowercase();

        if lower.starts_with("power:") && line.contains(',') {
            for part in line.split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "power" => out.power = Num::parse(&v),
                    "fre" => out.pwm_fre = Num::parse_int(&v),
                    "duty" => out.pwm_duty = Num::parse_int(&v),
                    "mode" => out.mode = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("head mode:") {
            if let Some((_, rest)) = line.split_once(':') {
                let parts: Vec<&str> = rest.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
                if let Some((first, tail)) = parts.split_first() {
                    out.head_mode = Num::parse_int(first);
                    for part in tail {
                        let Some((k, v)) = split_kv(part) else { continue };
                        match k.as_str() {
                            "fre" => out.head_fre = Num::parse_int(&v),
                            "width" => out.head_width = Num::parse_int(&v),
                            _ => {}
                        }
                    }
                }
            }
            continue;
        }

        if lower.starts_with("pulse tick") {
            for part in strip_label_colon(line, "pulse tick").split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "on" => out.pulse_on = Num::parse_int(&v),
                    "off" => out.pulse_off = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("gas tick") {
            for part in strip_label_colon(line, "gas tick").split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "early" => out.gas_early = Num::parse_int(&v),
                    "delay" => out.gas_delay = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("power tick") {
            for part in strip_label_colon(line, "power tick").split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "rise" => out.pow_rise = Num::parse_int(&v),
                    "fall" => out.pow_fall = Num::parse_int(&v),
                    "early" => out.pow_early = Num::parse_int(&v),
                    "delay" => out.pow_delay = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("power on") {
            for part in line.split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "power on" => out.power_on = Num::parse_int(&v),
                    "power off" => out.power_off = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("process index:") {
            if let Some((_, v)) = line.split_once(':') {
                out.index = Num::parse_int(v);
            }
            continue;
        }

        if lower.starts_with("feeder_mode:") {
            expect_out_len = false;
            expect_in_len = false;
            for part in line.split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "feeder_mode" => out.feeder_mode = Num::parse_int(&v),
                    "out_speed" => {
                        out.feeder_out_speed = Num::parse_int(&v);
                        expect_out_len = true;
                        expect_in_len = false;
                    }
                    "in_speed" => {
                        out.feeder_in_speed = Num::parse_int(&v);
                        expect_in_len = true;
                        expect_out_len = false;
                    }
                    "len" => {
                        if expect_out_len {
                            out.feeder_out_len = Num::parse_int(&v);
                            expect_out_len = false;
                        } else if expect_in_len {
                            out.feeder_in_len = Num::parse_int(&v);
                            expect_in_len = false;
                        }
                    }
                    _ => {}
                }
            }
            continue;
        }

        if lower.starts_with("feeder_cycle:") || lower.starts_with("smoothness:") {
            for part in line.split(',') {
                let Some((k, v)) = split_kv(part) else { continue };
                match k.as_str() {
                    "feeder_cycle" => out.feeder_cycle = Num::parse_int(&v),
                    "smoothness" => out.feeder_smoothness = Num::parse_int(&v),
                    "out_delay" => out.feeder_out_delay = Num::parse_int(&v),
                    "in_delay" => out.feeder_in_delay = Num::parse_int(&v),
                    "out_len" => out.feeder_out_len = Num::parse_int(&v),
                    "in_len" => out.feeder_in_len = Num::parse_int(&v),
                    _ => {}
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            out.extras.push(ExtraKv {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
    }

    out
}

fn split_kv(part: &str) -> Option<(String, String)> {
    let (k, v) = part.split_once(':')?;
    Some((k.trim().to_lowercase(), v.trim().to_string()))
}

fn strip_label_colon<'a>(line: &'a str, label: &str) -> &'a str {
    let rest = line[label.len()..].trim_start();
    rest.strip_prefix(':').map_or(rest, str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_line_dispatches_all_four_keys() {
        let p = parse_process("power:12.5,fre:20000,duty:50,mode:1\n");
        assert_eq!(p.power, Some(Num::Float(12.5)));
        assert_eq!(p.pwm_fre, Some(20000));
        assert_eq!(p.pwm_duty, Some(50));
        assert_eq!(p.mode, Some(1));
    }

    #[test]
    fn head_mode_first_value_then_keyed_tail() {
        let p = parse_process("Head Mode: 2, fre:100, width:5\n");
        assert_eq!(p.head_mode, Some(2));
        assert_eq!(p.head_fre, Some(100));
        assert_eq!(p.head_width, Some(5));
    }

    #[test]
    fn pulse_tick_colon_optional() {
        let p = parse_process("Pulse Tick: on:10, off:20\n");
        assert_eq!(p.pulse_on, Some(10));
        assert_eq!(p.pulse_off, Some(20));
    }

    #[test]
    fn feeder_mode_len_follows_most_recent_speed_key() {
        let text = "feeder_mode: 1, out_speed:100, len:5, in_speed:50, len:3\n";
        let p = parse_process(text);
        assert_eq!(p.feeder_mode, Some(1));
        assert_eq!(p.feeder_out_speed, Some(100));
        assert_eq!(p.feeder_out_len, Some(5));
        assert_eq!(p.feeder_in_speed, Some(50));
        assert_eq!(p.feeder_in_len, Some(3));
    }

    #[test]
    fn unrecognized_colon_line_becomes_extra() {
        let p = parse_process("SomeNewField: 42\n");
        assert_eq!(
            p.extras,
            vec![ExtraKv {
                key: "SomeNewField".to_string(),
                value: "42".to_string(),
            }]
        );
    }

    #[test]
    fn fractional_value_dropped_from_int_field() {
        let p = parse_process("Process index: 3.5\n");
        assert_eq!(p.index, None);
    }

    #[test]
    fn power_on_off_pair() {
        let p = parse_process("Power on:1, power off:0\n");
        assert_eq!(p.power_on, Some(1));
        assert_eq!(p.power_off, Some(0));
    }
}
