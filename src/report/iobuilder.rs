use crate::services::api::{ChannelSpec, SpecSource};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpecMeta {
    pub description: String,
    pub voltage_range: String,
    pub current_range: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredModule {
    pub company: String,
    pub model: String,
    pub rack_no: String,
    pub module_position: String,
    pub starting_sno: u32,
    pub digital_inputs: u32,
    pub digital_outputs: u32,
    pub analog_inputs: u32,
    pub analog_outputs: u32,
    pub spec: SpecMeta,
}

impl ConfiguredModule {
    pub fn total_channels(&self) -> u32 {
        self.digital_inputs + self.digital_outputs + self.analog_inputs + self.analog_outputs
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModbusRange {
    pub start_address: u32,
    pub end_address: u32,
    pub data_type: String,
    pub description: String,
    pub range: String,
}

impl ModbusRange {
    /// Inclusive intervals share at least one address.
    fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start_address <= end && start <= self.end_address
    }
}

pub const MODBUS_DATA_TYPES: &[&str] = &["coil", "discrete_input", "holding", "input"];

/// Scratch result of the last module lookup, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct ScratchSpec {
    pub spec: ChannelSpec,
    pub source: SpecSource,
}

/// Manual override inputs; empty string means "use the looked-up value".
#[derive(Debug, Clone, Default)]
pub struct ManualOverride {
    pub di: String,
    pub do_: String,
    pub ai: String,
    pub ao: String,
}

impl ManualOverride {
    fn all_present(&self) -> bool {
        ![&self.di, &self.do_, &self.ai, &self.ao]
            .iter()
            .any(|s| s.trim().is_empty())
    }
    fn clear(&mut self) {
        self.di.clear();
        self.do_.clear();
        self.ai.clear();
        self.ao.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleStats {
    pub total: usize,
    pub digital: usize,
    pub analog: usize,
    pub mixed: usize,
}

/// In-memory I/O configuration: ordered module and Modbus range lists plus
/// the lookup scratch slot and its transient inputs. Page-memory only; lost
/// on exit unless regenerated through the backend.
#[derive(Debug, Clone, Default)]
pub struct IoBuilder {
    pub modules: Vec<ConfiguredModule>,
    pub ranges: Vec<ModbusRange>,
    pub scratch: Option<ScratchSpec>,
    pub manual: ManualOverride,
    // When the lookup failed or came back empty from a non-web source, the
    // manual values are the required path.
    pub manual_required: bool,

    pub company: String,
    pub model: String,
    pub rack_no: String,
    pub position: String,
    pub starting_sno: String,

    pub modbus_start: String,
    pub modbus_end: String,
    pub modbus_type: usize,
    pub modbus_description: String,
    pub modbus_label: String,
}

impl IoBuilder {
    pub fn lookup_inputs_ok(&self) -> Result<(), String> {
        if self.company.trim().is_empty() || self.model.trim().is_empty() {
            return Err("Select a company and enter a module model first".into());
        }
        Ok(())
    }

    /// Install a lookup result into the scratch slot and pre-fill the manual
    /// override inputs from it. Last response to arrive wins.
    pub fn set_lookup_result(&mut self, spec: ChannelSpec, source: SpecSource) {
        self.manual.di = spec.digital_inputs.to_string();
        self.manual.do_ = spec.digital_outputs.to_string();
        self.manual.ai = spec.analog_inputs.to_string();
        self.manual.ao = spec.analog_outputs.to_string();
        self.manual_required = source == SpecSource::Manual
            || (spec.total() == 0 && spec.total_channels == 0 && source != SpecSource::Web);
        self.scratch = Some(ScratchSpec { spec, source });
    }

    /// Lookup failure still opens the manual path: an all-zero manual spec
    /// the user must edit and thereby confirm.
    pub fn set_lookup_failed(&mut self) {
        self.manual.clear();
        self.manual_required = true;
        self.scratch = Some(ScratchSpec {
            spec: ChannelSpec::default(),
            source: SpecSource::Manual,
        });
    }

    fn effective_count(manual: &str, looked_up: u32) -> u32 {
        let m = manual.trim();
        if m.is_empty() {
            looked_up
        } else {
            m.parse().unwrap_or(0)
        }
    }

    pub fn add_module(&mut self) -> Result<(), String> {
        let Some(scratch) = self.scratch.clone() else {
            return Err("Look up a module specification first".into());
        };
        let rack = self.rack_no.trim().to_string();
        let position = self.position.trim().to_string();
        if rack.is_empty() || position.is_empty() {
            return Err("Rack and position are required".into());
        }
        if self
            .modules
            .iter()
            .any(|m| m.rack_no == rack && m.module_position == position)
        {
            return Err(format!(
                "A module is already configured at Rack {rack}, Position {position}"
            ));
        }
        if self.manual_required && !self.manual.all_present() {
            return Err("Enter channel counts manually to confirm this module".into());
        }
        // Manual values win when present, independently per channel type
        let spec = &scratch.spec;
        let digital_inputs = Self::effective_count(&self.manual.di, spec.digital_inputs);
        let digital_outputs = Self::effective_count(&self.manual.do_, spec.digital_outputs);
        let analog_inputs = Self::effective_count(&self.manual.ai, spec.analog_inputs);
        let analog_outputs = Self::effective_count(&self.manual.ao, spec.analog_outputs);
        let description = if spec.description.is_empty() {
            format!("{} {}", self.company.trim(), self.model.trim())
        } else {
            spec.description.clone()
        };
        self.modules.push(ConfiguredModule {
            company: self.company.trim().to_string(),
            model: self.model.trim().to_string(),
            rack_no: rack,
            module_position: position.clone(),
            starting_sno: self.starting_sno.trim().parse().unwrap_or(1),
            digital_inputs,
            digital_outputs,
            analog_inputs,
            analog_outputs,
            spec: SpecMeta {
                description,
                voltage_range: spec
                    .voltage_range
                    .clone()
                    .unwrap_or_else(|| "24 VDC".into()),
                current_range: spec
                    .current_range
                    .clone()
                    .unwrap_or_else(|| "4-20mA".into()),
                verified: true,
            },
        });
        // Suggest the next slot and clear transient inputs
        if let Ok(p) = position.parse::<u32>() {
            self.position = (p + 1).to_string();
        }
        self.model.clear();
        self.manual.clear();
        self.manual_required = false;
        self.scratch = None;
        Ok(())
    }

    pub fn add_range(&mut self) -> Result<(), String> {
        let start: u32 = self
            .modbus_start
            .trim()
            .parse()
            .map_err(|_| "Enter valid start and end addresses".to_string())?;
        let end: u32 = self
            .modbus_end
            .trim()
            .parse()
            .map_err(|_| "Enter valid start and end addresses".to_string())?;
        if start > end {
            return Err("Start address must be less than or equal to end address".into());
        }
        let data_type = MODBUS_DATA_TYPES
            .get(self.modbus_type)
            .copied()
            .unwrap_or("holding")
            .to_string();
        if let Some(existing) = self
            .ranges
            .iter()
            .find(|r| r.data_type == data_type && r.overlaps(start, end))
        {
            return Err(format!(
                "Address range {start}-{end} overlaps with existing {data_type} range {}-{}",
                existing.start_address, existing.end_address
            ));
        }
        let description = {
            let d = self.modbus_description.trim();
            if d.is_empty() {
                "Modbus Range".to_string()
            } else {
                d.to_string()
            }
        };
        self.ranges.push(ModbusRange {
            start_address: start,
            end_address: end,
            data_type,
            description,
            range: self.modbus_label.trim().to_string(),
        });
        self.modbus_start.clear();
        self.modbus_end.clear();
        self.modbus_description.clear();
        self.modbus_label.clear();
        Ok(())
    }

    pub fn remove_module(&mut self, index: usize) -> bool {
        if index >= self.modules.len() {
            return false;
        }
        self.modules.remove(index);
        true
    }

    pub fn remove_range(&mut self, index: usize) -> bool {
        if index >= self.ranges.len() {
            return false;
        }
        self.ranges.remove(index);
        true
    }

    pub fn can_generate(&self) -> bool {
        !self.modules.is_empty() || !self.ranges.is_empty()
    }

    pub fn stats(&self) -> ModuleStats {
        let mut s = ModuleStats {
            total: self.modules.len(),
            ..Default::default()
        };
        for m in &self.modules {
            let has_digital = m.digital_inputs > 0 || m.digital_outputs > 0;
            let has_analog = m.analog_inputs > 0 || m.analog_outputs > 0;
            match (has_digital, has_analog) {
                (true, false) => s.digital += 1,
                (false, true) => s.analog += 1,
                (true, true) => s.mixed += 1,
                (false, false) => {}
            }
        }
        s
    }

    pub fn generation_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "modules": self.modules,
            "modbus_ranges": self.ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(di: u32, do_: u32, ai: u32, ao: u32) -> ChannelSpec {
        ChannelSpec {
            description: "test module".into(),
            digital_inputs: di,
            digital_outputs: do_,
            analog_inputs: ai,
            analog_outputs: ao,
            total_channels: di + do_ + ai + ao,
            voltage_range: None,
            current_range: None,
        }
    }

    fn builder_with_lookup() -> IoBuilder {
        let mut b = IoBuilder {
            company: "Siemens".into(),
            model: "SM1231".into(),
            rack_no: "1".into(),
            position: "1".into(),
            starting_sno: "1".into(),
            ..Default::default()
        };
        b.set_lookup_result(spec(16, 0, 0, 0), SpecSource::Cached);
        b
    }

    #[test]
    fn duplicate_rack_position_rejected_and_list_unchanged() {
        let mut b = builder_with_lookup();
        b.add_module().unwrap();
        // Convenience bump suggested position; force the duplicate back
        b.position = "1".into();
        b.model = "SM1231".into();
        b.set_lookup_result(spec(8, 0, 0, 0), SpecSource::Cached);
        let err = b.add_module().unwrap_err();
        assert!(err.contains("already configured at Rack 1, Position 1"));
        assert_eq!(b.modules.len(), 1);
    }

    #[test]
    fn add_module_requires_prior_lookup() {
        let mut b = IoBuilder {
            company: "Siemens".into(),
            model: "SM1231".into(),
            rack_no: "1".into(),
            position: "1".into(),
            ..Default::default()
        };
        assert!(b.add_module().unwrap_err().contains("Look up"));
    }

    #[test]
    fn manual_values_win_per_channel_type() {
        let mut b = builder_with_lookup();
        b.set_lookup_result(spec(16, 8, 4, 2), SpecSource::Cached);
        b.manual.di = "12".into();
        b.manual.ao = "0".into();
        b.add_module().unwrap();
        let m = &b.modules[0];
        assert_eq!(m.digital_inputs, 12, "manual override");
        assert_eq!(m.digital_outputs, 8, "looked-up value kept");
        assert_eq!(m.analog_inputs, 4);
        assert_eq!(m.analog_outputs, 0, "manual zero wins");
    }

    #[test]
    fn add_module_bumps_position_and_clears_transients() {
        let mut b = builder_with_lookup();
        b.add_module().unwrap();
        assert_eq!(b.position, "2");
        assert!(b.model.is_empty());
        assert!(b.scratch.is_none());
        assert!(b.can_generate());
    }

    #[test]
    fn zero_total_from_cache_requires_manual_confirmation() {
        let mut b = builder_with_lookup();
        b.set_lookup_result(spec(0, 0, 0, 0), SpecSource::Cached);
        assert!(b.manual_required);
        b.manual.clear();
        let err = b.add_module().unwrap_err();
        assert!(err.contains("manually"));
        b.manual.di = "8".into();
        b.manual.do_ = "0".into();
        b.manual.ai = "0".into();
        b.manual.ao = "0".into();
        b.add_module().unwrap();
        assert_eq!(b.modules[0].digital_inputs, 8);
    }

    #[test]
    fn zero_total_from_web_is_accepted_as_is() {
        let mut b = builder_with_lookup();
        b.set_lookup_result(spec(0, 0, 0, 0), SpecSource::Web);
        assert!(!b.manual_required);
    }

    #[test]
    fn overlapping_ranges_of_same_type_rejected() {
        let mut b = IoBuilder::default();
        let holding = MODBUS_DATA_TYPES
            .iter()
            .position(|t| *t == "holding")
            .unwrap();
        b.modbus_type = holding;
        b.modbus_start = "10".into();
        b.modbus_end = "20".into();
        b.add_range().unwrap();
        // [15,25] shares 15..=20 with [10,20]
        b.modbus_type = holding;
        b.modbus_start = "15".into();
        b.modbus_end = "25".into();
        let err = b.add_range().unwrap_err();
        assert!(err.contains("overlaps"));
        assert_eq!(b.ranges.len(), 1);
        // [21,25] touches nothing
        b.modbus_start = "21".into();
        b.modbus_end = "25".into();
        b.add_range().unwrap();
        assert_eq!(b.ranges.len(), 2);
    }

    #[test]
    fn same_addresses_different_type_allowed() {
        let mut b = IoBuilder::default();
        b.modbus_type = 0; // coil
        b.modbus_start = "10".into();
        b.modbus_end = "20".into();
        b.add_range().unwrap();
        b.modbus_type = 2; // holding
        b.modbus_start = "10".into();
        b.modbus_end = "20".into();
        b.add_range().unwrap();
        assert_eq!(b.ranges.len(), 2);
    }

    #[test]
    fn range_validation_messages() {
        let mut b = IoBuilder::default();
        b.modbus_start = "abc".into();
        b.modbus_end = "20".into();
        assert!(b.add_range().unwrap_err().contains("valid start"));
        b.modbus_start = "30".into();
        b.modbus_end = "20".into();
        assert!(b
            .add_range()
            .unwrap_err()
            .contains("less than or equal"));
    }

    #[test]
    fn stats_classify_modules() {
        let mut b = builder_with_lookup();
        b.add_module().unwrap(); // digital only
        b.model = "AI8".into();
        b.set_lookup_result(spec(0, 0, 8, 0), SpecSource::Cached);
        b.add_module().unwrap(); // analog only
        b.model = "MIX".into();
        b.set_lookup_result(spec(4, 0, 4, 0), SpecSource::Cached);
        b.add_module().unwrap(); // mixed
        assert_eq!(
            b.stats(),
            ModuleStats {
                total: 3,
                digital: 1,
                analog: 1,
                mixed: 1
            }
        );
    }

    #[test]
    fn removal_reevaluates_generation() {
        let mut b = builder_with_lookup();
        b.add_module().unwrap();
        assert!(b.can_generate());
        assert!(b.remove_module(0));
        assert!(!b.can_generate());
        assert!(!b.remove_module(0));
    }

    #[test]
    fn payload_carries_both_lists() {
        let mut b = builder_with_lookup();
        b.add_module().unwrap();
        b.modbus_start = "1".into();
        b.modbus_end = "4".into();
        b.add_range().unwrap();
        let payload = b.generation_payload();
        assert_eq!(payload["modules"].as_array().unwrap().len(), 1);
        assert_eq!(payload["modbus_ranges"].as_array().unwrap().len(), 1);
        assert_eq!(payload["modules"][0]["spec"]["verified"], true);
    }
}
