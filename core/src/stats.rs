//! Aggregate statistics for the technician dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentCount {
    pub equipment_type: String,
    pub count: u64,
}

/// Counts reported by `GET /stats/`. Every field is optional on the wire and
/// an explicit `null` reads as the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    #[serde(deserialize_with = "null_as_default")]
    pub pending: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub in_process: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub closed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(rename = "totalTickets", deserialize_with = "null_as_default")]
    pub total_tickets: u64,
    #[serde(rename = "completedTickets", deserialize_with = "null_as_default")]
    pub completed_tickets: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub technicians: Vec<String>,
    #[serde(rename = "technicianPerformance", skip_serializing_if = "Option::is_none")]
    pub technician_performance: Option<BTreeMap<String, u64>>,
    #[serde(rename = "failureTypes", skip_serializing_if = "Option::is_none")]
    pub failure_types: Option<BTreeMap<String, u64>>,
    #[serde(rename = "equipmentFrequency", skip_serializing_if = "Option::is_none")]
    pub equipment_frequency: Option<Vec<EquipmentCount>>,
}

impl Statistics {
    /// Completed tickets as a rounded percentage of all tickets.
    pub fn completion_rate(&self) -> u64 {
        if self.total_tickets == 0 {
            return 0;
        }
        (self.completed_tickets as f64 / self.total_tickets as f64 * 100.0).round() as u64
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Everything the technician dashboard renders, fetched in one go.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub pending: Vec<Ticket>,
    pub completed: Vec<Ticket>,
    pub statistics: Statistics,
}
