// tokencart_service/src/models/customer.rs

use serde::{Deserialize, Serialize};

/// Contact and address details as entered at checkout.
///
/// Stored with the order as a snapshot: later profile edits never reach it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(default)]
  pub zip_code: Option<String>,
  #[serde(default)]
  pub country: Option<String>,
}

impl CustomerSnapshot {
  /// The trimmed email, if one was given.
  pub fn contact_email(&self) -> Option<&str> {
    self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
  }

  pub fn display_name(&self) -> String {
    let name = [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(" ");
    if name.is_empty() {
      "Valued Customer".to_string()
    } else {
      name
    }
  }
}
