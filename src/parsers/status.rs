//! Parser for `status` output: times, modes, flags, power telemetry, drive
//! readings, pilot/PD/NTC sensors, environment summary, and warning/error/lock
//! masks.
//!
//! Each field is matched against a fixed line prefix and a strict textual
//! pattern (no regex crate — plain byte scanning, matching how the rest of
//! this codebase's textual dispatch is written). A field whose line is absent
//! or doesn't match its pattern is simply absent from the result; there is no
//! hard failure.

use indexmap::IndexMap;
use serde::Serialize;

/// A leading integer with an optional trailing unit word (`pulse_on`/`pulse_off`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntWithUnit {
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerOut {
    pub pct: f64,
    pub w: i64,
    pub dac: i64,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerParam {
    pub power: f64,
    pub pwm_fre: i64,
    pub pwm_duty: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerDrive {
    pub v: f64,
    pub a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyState {
    pub state: i64,
    pub j: i64,
    pub dac: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PilotState {
    pub ma: f64,
    pub adc: i64,
    pub dac: i64,
    pub onoff: String,
    pub mode: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PdVoltage {
    pub mv: f64,
    pub adc: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NtcReading {
    pub c: f64,
    pub adc: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdcScalar {
    pub value: f64,
    pub adc: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AirTScalar {
    pub value_c: f64,
    pub adc: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvSummary {
    pub temp_c: f64,
    pub pres_kpa: f64,
    pub dew: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskField {
    pub mask: String,
    pub text: String,
}

/// Sparse parse of one `status` exec's output. Absence of a field means the
/// device did not emit the corresponding line in this sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_on_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtc_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub laser_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_on: Option<IntWithUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_off: Option<IntWithUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_state: Option<i64>,
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub io_flags: IndexMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_out: Option<PowerOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_param: Option<PowerParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_drive: Option<PowerDrive>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub drive_volt: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub drive_current: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pilot: Option<PilotState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pd: Option<PdVoltage>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ntc: Vec<NtcReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<AdcScalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_hr: Option<AdcScalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_t: Option<AirTScalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<MaskField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MaskField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<MaskField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tem: Option<i64>,
}

/// Parse the body of a `status` exec into a sparse [`ParsedStatus`].
#[must_use]
pub fn parse_status(text: &str) -> ParsedStatus {
    let text = text.replace('\r', "");
    let mut out = ParsedStatus::default();
    let mut temp_pres: Option<(f64, f64)> = None;
    let mut dew: Option<f64> = None;

    for line in text.lines() {
        if out.power_on_time.is_none() {
            out.power_on_time = match_rest(line, "Power-ON time:");
        }
        if out.rtc_time.is_none() {
            out.rtc_time = match_rest(line, "RTC time:");
        }
        if out.work_mode.is_none() {
            out.work_mode = match_rest(line, "Work Mode:");
        }
        if out.work_state.is_none() {
            out.work_state = match_rest(line, "Work State:");
        }
        if out.laser_state.is_none() {
            out.laser_state = match_rest(line, "laser State:");
        }
        if out.pulse_on.is_none() {
            out.pulse_on = match_int_with_unit(line, "pulse_on:");
        }
        if out.pulse_off.is_none() {
            out.pulse_off = match_int_with_unit(line, "pulse_off:");
        }
        if out.wave_state.is_none() {
            out.wave_state = match_plain_int(line, "wave state:");
        }
        if out.io_flags.is_empty() {
            if let Some(rest) = match_rest(line, "IO state:") {
                let flags = find_name_int_pairs(&rest);
                if !flags.is_empty() {
                    out.io_flags = flags;
                }
            }
        }
        if out.power_out.is_none() {
            out.power_out = match_power_out(line);
        }
        if out.power_param.is_none() {
            out.power_param = match_power_param(line);
        }
        if out.power_drive.is_none() {
            out.power_drive = match_power_drive(line);
        }
        if out.drive_volt.is_empty() {
            if let Some(rest) = match_rest(line, "Drive volt1~2:") {
                let mut nums = extract_all_numbers(&rest);
                nums.truncate(2);
                if !nums.is_empty() {
                    out.drive_volt = nums;
                }
            }
        }
        if out.drive_current.is_empty() {
            if let Some(rest) = match_rest(line, "Drive current1~4:") {
                let mut nums = extract_all_numbers(&rest);
                nums.truncate(4);
                if !nums.is_empty() {
                    out.drive_current = nums;
                }
            }
        }
        if out.energy.is_none() {
            out.energy = match_energy(line);
        }
        if out.pilot.is_none() {
            out.pilot = match_pilot_state(line);
        }
        if out.pd.is_none() {
            out.pd = match_pd_voltage(line);
        }
        if let Some(rest) = match_rest(line, "NTC1~4:") {
            out.ntc.extend(find_ntc_pairs(&rest));
        }
        if let Some(rest) = match_rest(line, "NTC5~8:") {
            out.ntc.extend(find_ntc_pairs(&rest));
        }
        if out.pressure.is_none() {
            out.pressure = match_adc_scalar(line, "Pressure:", None);
        }
        if out.air_hr.is_none() {
            out.air_hr = match_adc_scalar(line, "AirHR:", Some('%'));
        }
        if out.air_t.is_none() {
            out.air_t = match_air_t(line);
        }
        if let Some((temp_c, pres_kpa)) = match_temp_pres(line) {
            temp_pres = Some((temp_c, pres_kpa));
        }
        if dew.is_none() {
            dew = match_dew(line);
        }
        if out.warning.is_none() {
            out.warning = match_mask_field(line, "WARNING(", true);
        }
        if out.error.is_none() {
            out.error = match_mask_field(line, "ERROR(", true);
        }
        if out.lock.is_none() {
            out.lock = match_mask_field(line, "LOCK(", false);
        }
        if out.tem.is_none() {
            out.tem = match_tem(line);
        }
    }

    if temp_pres.is_some() || dew.is_some() {
        let (temp_c, pres_kpa) = temp_pres.unwrap_or((f64::NAN, f64::NAN));
        out.env = Some(EnvSummary {
            temp_c,
            pres_kpa,
            dew: dew.unwrap_or(f64::NAN),
        });
    }

    out
}

// ---------- line matchers ----------

fn match_rest(line: &str, prefix: &str) -> Option<String> {
    let rest = line.strip_prefix(prefix)?.trim_start();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn scan_digits(s: &str, start: usize) -> usize {
    let bytes = s.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i
}

fn scan_number(s: &str, start: usize) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut i = start;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let ds = i;
    i = scan_digits(s, i);
    if i == ds {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let dot = i;
        let mut j = i + 1;
        j = scan_digits(s, j);
        if j > dot + 1 {
            i = j;
        }
    }
    s[start..i].parse::<f64>().ok().map(|v| (v, i))
}

fn extract_all_numbers(s: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < s.len() {
        if let Some((v, j)) = scan_number(s, i) {
            out.push(v);
            i = j;
        } else {
            i += 1;
        }
    }
    out
}

fn find_ntc_pairs(s: &str) -> Vec<NtcReading> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < s.len() {
        if let Some((c, j)) = scan_number(s, i) {
            if let Some(tail) = s[j..].strip_prefix("C,ADC(") {
                let ds = 0;
                let de = scan_digits(tail, ds);
                if de > ds && tail[de..].starts_with(')') {
                    if let Ok(adc) = tail[ds..de].parse::<i64>() {
                        out.push(NtcReading { c, adc });
                        i = j + "C,ADC(".len() + de + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    out
}

fn find_name_int_pairs(s: &str) -> IndexMap<String, i64> {
    let bytes = s.as_bytes();
    let mut out = IndexMap::new();
    let mut i = 0;
    while i < bytes.len() {
        if !(bytes[i].is_ascii_uppercase() || bytes[i].is_ascii_digit() || bytes[i] == b'_') {
            i += 1;
            continue;
        }
        let ns = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_uppercase() || bytes[i].is_ascii_digit() || bytes[i] == b'_')
        {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'(' {
            let name = &s[ns..i];
            let ds = i + 1;
            let de = scan_digits(s, ds);
            if de > ds && de < bytes.len() && bytes[de] == b')' {
                if let Ok(val) = s[ds..de].parse::<i64>() {
                    out.insert(name.to_string(), val);
                    i = de + 1;
                    continue;
                }
            }
        }
    }
    out
}

fn match_int_with_unit(line: &str, prefix: &str) -> Option<IntWithUnit> {
    let rest = line.strip_prefix(prefix)?.trim_start();
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let value: i64 = rest[..de].parse().ok()?;
    let tail = rest[de..].trim();
    if tail.is_empty() {
        Some(IntWithUnit { value, unit: None })
    } else if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(IntWithUnit {
            value,
            unit: Some(tail.to_string()),
        })
    } else {
        None
    }
}

fn match_plain_int(line: &str, prefix: &str) -> Option<i64> {
    let rest = line.strip_prefix(prefix)?.trim_start();
    let de = scan_digits(rest, 0);
    if de == 0 || !rest[de..].trim().is_empty() {
        return None;
    }
    rest[..de].parse().ok()
}

fn match_power_out(line: &str) -> Option<PowerOut> {
    let rest = line.strip_prefix("Power Out:")?.trim_start();
    let pct_end = scan_pct_digits(rest, 0);
    if pct_end == 0 {
        return None;
    }
    let pct: f64 = rest[..pct_end].parse().ok()?;
    let mut i = pct_end;
    if !rest[i..].starts_with('%') {
        return None;
    }
    i += 1;
    let paren_rel = rest[i..].find('(')?;
    i += paren_rel + 1;
    while rest.as_bytes().get(i) == Some(&b' ') {
        i += 1;
    }
    let w_start = i;
    let w_end = scan_digits(rest, w_start);
    if w_end == w_start {
        return None;
    }
    let w: i64 = rest[w_start..w_end].parse().ok()?;
    i = w_end;
    while rest.as_bytes().get(i) == Some(&b' ') {
        i += 1;
    }
    if !rest[i..].starts_with('w') {
        return None;
    }
    i += 1;
    let rest2 = rest[i..].strip_prefix("),DAC(")?;
    let de = scan_digits(rest2, 0);
    if de == 0 {
        return None;
    }
    let dac: i64 = rest2[..de].parse().ok()?;
    let rest3 = rest2[de..].strip_prefix("),state(")?;
    let end = rest3.find(')')?;
    let state = &rest3[..end];
    if state.is_empty() || !state.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    if !rest3[end + 1..].trim().is_empty() {
        return None;
    }
    Some(PowerOut {
        pct,
        w,
        dac,
        state: state.to_string(),
    })
}

fn scan_pct_digits(s: &str, start: usize) -> usize {
    let bytes = s.as_bytes();
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    i
}

fn match_power_param(line: &str) -> Option<PowerParam> {
    let rest = line.strip_prefix("Power Param:")?.trim_start();
    let rest = rest.strip_prefix("power(")?;
    let (power, end) = scan_number(rest, 0)?;
    let rest = rest[end..].strip_prefix("),pwm_fre(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let pwm_fre: i64 = rest[..de].parse().ok()?;
    let rest = rest[de..].strip_prefix("),pwm_duty(")?;
    let de2 = scan_digits(rest, 0);
    if de2 == 0 {
        return None;
    }
    let pwm_duty: i64 = rest[..de2].parse().ok()?;
    if !rest[de2..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(PowerParam {
        power,
        pwm_fre,
        pwm_duty,
    })
}

fn match_power_drive(line: &str) -> Option<PowerDrive> {
    let rest = line.strip_prefix("Power drive:")?.trim_start();
    let (v, end) = scan_number(rest, 0)?;
    let rest = rest[end..].trim_start().strip_prefix("V,")?.trim_start();
    let (a, end2) = scan_number(rest, 0)?;
    if !rest[end2..].trim_start().strip_prefix('A')?.trim().is_empty() {
        return None;
    }
    Some(PowerDrive { v, a })
}

fn match_energy(line: &str) -> Option<EnergyState> {
    let rest = line.strip_prefix("Energy:")?.trim_start();
    let rest = rest.strip_prefix("state(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let state: i64 = rest[..de].parse().ok()?;
    let rest = rest[de..].strip_prefix("),(")?;
    let de2 = scan_digits(rest, 0);
    if de2 == 0 {
        return None;
    }
    let j: i64 = rest[..de2].parse().ok()?;
    let rest = rest[de2..].trim_start().strip_prefix("J),DAC(")?;
    let de3 = scan_digits(rest, 0);
    if de3 == 0 {
        return None;
    }
    let dac: i64 = rest[..de3].parse().ok()?;
    if !rest[de3..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(EnergyState { state, j, dac })
}

fn match_pilot_state(line: &str) -> Option<PilotState> {
    let rest = line.strip_prefix("Pilot State:")?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 {
        return None;
    }
    let ma: f64 = rest[..end].parse().ok()?;
    let rest = rest[end..].strip_prefix("mA,ADC(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let adc: i64 = rest[..de].parse().ok()?;
    let rest = rest[de..].strip_prefix(')')?.trim_start().strip_prefix(',')?.trim_start();
    let rest = rest.strip_prefix("DAC(")?;
    let de2 = scan_digits(rest, 0);
    if de2 == 0 {
        return None;
    }
    let dac: i64 = rest[..de2].parse().ok()?;
    let rest = rest[de2..].strip_prefix(')')?.trim_start().strip_prefix(',')?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let end_paren = rest.find(')')?;
    let onoff = &rest[..end_paren];
    if onoff.is_empty() || !onoff.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let rest = rest[end_paren + 1..].trim_start().strip_prefix(',')?.trim_start();
    let rest = rest.strip_prefix("mode(")?;
    let de3 = scan_digits(rest, 0);
    if de3 == 0 {
        return None;
    }
    let mode: i64 = rest[..de3].parse().ok()?;
    if !rest[de3..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(PilotState {
        ma,
        adc,
        dac,
        onoff: onoff.to_string(),
        mode,
    })
}

fn match_pd_voltage(line: &str) -> Option<PdVoltage> {
    let rest = line.strip_prefix("PD Voltage:")?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 {
        return None;
    }
    let mv: f64 = rest[..end].parse().ok()?;
    let rest = rest[end..].strip_prefix("mV,ADC(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let adc: i64 = rest[..de].parse().ok()?;
    if !rest[de..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(PdVoltage { mv, adc })
}

fn match_adc_scalar(line: &str, prefix: &str, optional_suffix: Option<char>) -> Option<AdcScalar> {
    let rest = line.strip_prefix(prefix)?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 {
        return None;
    }
    let value: f64 = rest[..end].parse().ok()?;
    let mut rest = &rest[end..];
    if let Some(suffix) = optional_suffix {
        if let Some(stripped) = rest.strip_prefix(suffix) {
            rest = stripped;
        }
    }
    let rest = rest.strip_prefix(",ADC(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let adc: i64 = rest[..de].parse().ok()?;
    if !rest[de..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(AdcScalar { value, adc })
}

fn match_air_t(line: &str) -> Option<AirTScalar> {
    let rest = line.strip_prefix("AirT:")?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 {
        return None;
    }
    let value_c: f64 = rest[..end].parse().ok()?;
    let rest = rest[end..].strip_prefix('C')?;
    let rest = rest.strip_prefix(",ADC(")?;
    let de = scan_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let adc: i64 = rest[..de].parse().ok()?;
    if !rest[de..].strip_prefix(')')?.trim().is_empty() {
        return None;
    }
    Some(AirTScalar { value_c, adc })
}

fn match_temp_pres(line: &str) -> Option<(f64, f64)> {
    let rest = line.strip_prefix("Temp:")?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 {
        return None;
    }
    let temp_c: f64 = rest[..end].parse().ok()?;
    let rest = rest[end..].trim_start().strip_prefix('C')?.trim_start();
    let rest = rest.strip_prefix("Pres:")?.trim_start();
    let end2 = scan_pct_digits(rest, 0);
    if end2 == 0 {
        return None;
    }
    let pres_kpa: f64 = rest[..end2].parse().ok()?;
    if !rest[end2..].trim_start().strip_prefix("KPa")?.trim().is_empty() {
        return None;
    }
    Some((temp_c, pres_kpa))
}

fn match_dew(line: &str) -> Option<f64> {
    let rest = line.strip_prefix("Dew:")?.trim_start();
    let end = scan_pct_digits(rest, 0);
    if end == 0 || !rest[end..].trim().is_empty() {
        return None;
    }
    rest[..end].parse().ok()
}

fn match_mask_field(line: &str, prefix: &str, require_nonempty_text: bool) -> Option<MaskField> {
    let rest = line.strip_prefix(prefix)?;
    let rest = rest.strip_prefix("0x")?;
    let de = scan_hex_digits(rest, 0);
    if de == 0 {
        return None;
    }
    let mask = format!("0x{}", &rest[..de]);
    let rest = rest[de..].strip_prefix(')')?.strip_prefix(':')?.trim_start();
    let text = rest.trim();
    if require_nonempty_text && text.is_empty() {
        return None;
    }
    Some(MaskField {
        mask,
        text: text.to_string(),
    })
}

fn scan_hex_digits(s: &str, start: usize) -> usize {
    let bytes = s.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
        i += 1;
    }
    i
}

fn match_tem(line: &str) -> Option<i64> {
    let rest = line.strip_prefix("TEM:")?;
    let de = scan_digits(rest, 0);
    if de == 0 || !rest[de..].trim().is_empty() {
        return None;
    }
    rest[..de].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_out_strict_comma_spacing() {
        let loose = "Power Out: 12.5% (34 w), DAC(255), state(ON)";
        assert!(match_power_out(loose).is_none());

        let strict = "Power Out: 12.5%(34 w),DAC(255),state(ON)";
        let parsed = match_power_out(strict).expect("strict form should parse");
        assert!((parsed.pct - 12.5).abs() < 1e-9);
        assert_eq!(parsed.w, 34);
        assert_eq!(parsed.dac, 255);
        assert_eq!(parsed.state, "ON");
    }

    #[test]
    fn env_present_with_missing_dew_is_nan() {
        let text = "Temp: 25.0 C  Pres: 100.0 KPa\n";
        let parsed = parse_status(text);
        let env = parsed.env.expect("env should be present");
        assert!((env.temp_c - 25.0).abs() < 1e-9);
        assert!((env.pres_kpa - 100.0).abs() < 1e-9);
        assert!(env.dew.is_nan());
    }

    #[test]
    fn env_present_from_dew_alone() {
        let text = "Dew: 3.5\n";
        let parsed = parse_status(text);
        let env = parsed.env.expect("env should be present from dew alone");
        assert!(env.temp_c.is_nan());
        assert!(env.pres_kpa.is_nan());
        assert!((env.dew - 3.5).abs() < 1e-9);
    }

    #[test]
    fn ntc_pairs_concatenate_in_order() {
        let text = "NTC1~4: 22.4C,ADC(2162), 0.0C,ADC(4091)\nNTC5~8: 1.0C,ADC(1)\n";
        let parsed = parse_status(text);
        assert_eq!(parsed.ntc.len(), 3);
        assert!((parsed.ntc[0].c - 22.4).abs() < 1e-9);
        assert_eq!(parsed.ntc[0].adc, 2162);
        assert_eq!(parsed.ntc[2].adc, 1);
    }

    #[test]
    fn io_flags_parsed_as_name_int_pairs() {
        let text = "IO state: LASER_EN(1) GAS(0) DOOR(1)\n";
        let parsed = parse_status(text);
        assert_eq!(parsed.io_flags["LASER_EN"], 1);
        assert_eq!(parsed.io_flags["GAS"], 0);
        assert_eq!(parsed.io_flags["DOOR"], 1);
    }

    #[test]
    fn warning_mask_and_text() {
        let text = "WARNING(0x0041): OverTemp\n";
        let parsed = parse_status(text);
        let w = parsed.warning.expect("warning present");
        assert_eq!(w.mask, "0x0041");
        assert_eq!(w.text, "OverTemp");
    }

    #[test]
    fn lock_allows_empty_text() {
        let text = "LOCK(0x0000):\n";
        let parsed = parse_status(text);
        let l = parsed.lock.expect("lock present");
        assert_eq!(l.mask, "0x0000");
        assert_eq!(l.text, "");
    }

    #[test]
    fn tem_requires_no_space_after_colon() {
        assert_eq!(parse_status("TEM:42\n").tem, Some(42));
        assert_eq!(parse_status("TEM: 42\n").tem, None);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let parsed = parse_status("Work State: Idle\nmsh >\n");
        assert_eq!(parsed.work_state.as_deref(), Some("Idle"));
        assert!(parsed.power_out.is_none());
        assert!(parsed.energy.is_none());
    }

    #[test]
    fn drive_volt_and_current_truncate() {
        let text = "Drive volt1~2: 1.0 2.0 3.0\nDrive current1~4: 1.0 2.0 3.0 4.0 5.0\n";
        let parsed = parse_status(text);
        assert_eq!(parsed.drive_volt, vec![1.0, 2.0]);
        assert_eq!(parsed.drive_current, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
