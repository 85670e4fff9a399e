//! Staffing directory: best-effort lookup of the on-call technician.

use std::time::Duration;

use async_trait::async_trait;
use coordination::Contact;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("directory {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no on-call technician with a phone number in any directory")]
    NoTechnician,
}

/// One assignments endpoint, labelled with the trade it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEndpoint {
    /// Trade keyword, matched case-insensitively against the emergency type.
    pub kind: String,
    pub url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// On-call contact for an emergency of the given type.
    async fn on_call(&self, emergency_type: &str) -> Result<Contact, DirectoryError>;
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentsResponse {
    #[serde(default)]
    assignments: Vec<Option<Assignment>>,
}

#[derive(Debug, Default, Deserialize)]
struct Assignment {
    #[serde(default)]
    techs: Vec<Option<Tech>>,
}

#[derive(Debug, Default, Deserialize)]
struct Tech {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<serde_json::Value>,
}

impl Tech {
    /// Phone as text; the directory sometimes stores it as a number or "null".
    fn phone(&self) -> Option<String> {
        let phone = match self.phone.as_ref()? {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!phone.is_empty() && phone != "null").then_some(phone)
    }
}

/// Client for one or more `/assignments` endpoints.
pub struct AssignmentsDirectory {
    http: reqwest::Client,
    endpoints: Vec<DirectoryEndpoint>,
}

impl AssignmentsDirectory {
    pub fn new(endpoints: Vec<DirectoryEndpoint>) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, endpoints })
    }

    /// Endpoints whose kind matches the emergency type first, then the rest
    /// in configured order.
    pub fn ordered_for(&self, emergency_type: &str) -> Vec<&DirectoryEndpoint> {
        let kind = emergency_type.to_uppercase();
        let (mut matching, rest): (Vec<_>, Vec<_>) = self.endpoints.iter().partition(|e| {
            let keyword = e.kind.trim().to_uppercase();
            !keyword.is_empty() && kind.contains(&keyword)
        });
        matching.extend(rest);
        matching
    }

    async fn first_tech(&self, endpoint: &DirectoryEndpoint) -> Result<Option<Contact>, DirectoryError> {
        let response = self.http.get(&endpoint.url).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status {
                url: endpoint.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let body: AssignmentsResponse = response.json().await?;
        let contact = body
            .assignments
            .into_iter()
            .flatten()
            .flat_map(|a| a.techs)
            .flatten()
            .find_map(|tech| {
                let phone = tech.phone()?;
                Some(Contact::new(tech.name.unwrap_or_default(), phone))
            });
        Ok(contact)
    }
}

#[async_trait]
impl Directory for AssignmentsDirectory {
    async fn on_call(&self, emergency_type: &str) -> Result<Contact, DirectoryError> {
        for endpoint in self.ordered_for(emergency_type) {
            match self.first_tech(endpoint).await {
                Ok(Some(contact)) => {
                    debug!(kind = %endpoint.kind, name = %contact.name, "on-call technician found");
                    return Ok(contact);
                }
                Ok(None) => debug!(kind = %endpoint.kind, "no technician with a phone"),
                Err(e) => warn!(kind = %endpoint.kind, error = %e, "directory lookup failed"),
            }
        }
        Err(DirectoryError::NoTechnician)
    }
}
