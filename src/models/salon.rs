//! Salon catalog records
//!
//! Typed payloads served by the memoized demo endpoints and written by the
//! cache warm-up.

use serde::{Deserialize, Serialize};

/// A booked appointment on the salon agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u32,
    pub client: String,
    pub service: String,
    /// Local time, `HH:MM`
    pub time: String,
}

/// Opening hours and booking capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalonSettings {
    pub opening_time: String,
    pub closing_time: String,
    pub max_concurrent_appointments: u32,
}

/// An entry of the service catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: u32,
    pub name: String,
    pub duration_minutes: u32,
}

fn appointment(id: u32, client: &str, service: &str, time: &str) -> Appointment {
    Appointment {
        id,
        client: client.to_string(),
        service: service.to_string(),
        time: time.to_string(),
    }
}

fn offering(id: u32, name: &str, duration_minutes: u32) -> ServiceOffering {
    ServiceOffering {
        id,
        name: name.to_string(),
        duration_minutes,
    }
}

/// Most requested upcoming appointments.
pub fn frequent_appointments() -> Vec<Appointment> {
    vec![
        appointment(1, "Laura Perez", "Haircut and blow-dry", "10:00"),
        appointment(2, "Carlos Gomez", "Hair colouring", "11:00"),
    ]
}

pub fn salon_settings() -> SalonSettings {
    SalonSettings {
        opening_time: "08:00".to_string(),
        closing_time: "18:00".to_string(),
        max_concurrent_appointments: 3,
    }
}

pub fn service_catalog() -> Vec<ServiceOffering> {
    vec![
        offering(1, "Haircut", 30),
        offering(2, "Full colouring", 90),
        offering(3, "Manicure", 45),
        offering(4, "Hair treatment", 60),
    ]
}
