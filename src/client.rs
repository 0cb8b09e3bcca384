use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, ApiProfile, DEFAULT_APP_ID, TASK_SUCCEEDED};
use crate::schedule;
use crate::session::Session;
use crate::types::*;
use crate::{Error, Result};

/// A state-changing request. Dispatching one returns a [`TaskHandle`] to be
/// polled to completion.
#[derive(Debug, Clone)]
pub enum Command {
    SetSystemMode {
        mode: SystemMode,
        /// Whole-day granularity; absent means permanent.
        until: Option<NaiveDate>,
    },
    SetZoneSetpoint {
        value: f64,
        until: Option<NaiveDateTime>,
    },
    CancelZoneOverride,
    SetHotWaterState {
        state: HotWaterState,
        until: Option<NaiveDateTime>,
    },
    SetSchedule(WeeklySchedule),
}

pub struct EvoClientBuilder {
    username: String,
    password: String,
    profile: ApiProfile,
    base_url: Option<String>,
    app_id: Option<String>,
    poll_policy: PollPolicy,
    boundary_rule: BoundaryRule,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl EvoClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            profile: ApiProfile::default(),
            base_url: None,
            app_id: None,
            poll_policy: PollPolicy::default(),
            boundary_rule: BoundaryRule::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn profile(mut self, profile: ApiProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override the service base URL (used by tests to point at a mock).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn app_id(mut self, id: impl Into<String>) -> Self {
        self.app_id = Some(id.into());
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn boundary_rule(mut self, rule: BoundaryRule) -> Self {
        self.boundary_rule = rule;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> EvoClient {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => {
                Some(MessageLogger::new(mode, &path).expect("failed to open log file"))
            }
            _ => None,
        };

        let base_url = self
            .base_url
            .unwrap_or_else(|| self.profile.default_base_url().to_string());
        let app_id = self.app_id.unwrap_or_else(|| DEFAULT_APP_ID.to_string());

        EvoClient {
            http,
            base_url,
            profile: self.profile,
            session: Session::new(self.username, self.password, app_id),
            tree: None,
            poll_policy: self.poll_policy,
            boundary_rule: self.boundary_rule,
            logger,
        }
    }
}

/// Client for one authenticated account against one API profile.
///
/// Every network operation takes `&mut self`, so a client instance has a
/// single logical caller at a time: token refresh cannot race itself and a
/// discovery refresh swaps in a fully built tree. Wrap the client in a
/// mutex to share it across tasks.
pub struct EvoClient {
    http: reqwest::Client,
    base_url: String,
    profile: ApiProfile,
    session: Session,
    tree: Option<DeviceTree>,
    poll_policy: PollPolicy,
    boundary_rule: BoundaryRule,
    logger: Option<MessageLogger>,
}

#[derive(Serialize, Deserialize)]
struct ScheduleBackupEntry {
    name: String,
    schedule: Value,
}

impl EvoClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> EvoClientBuilder {
        EvoClientBuilder::new(username, password)
    }

    /// Exchanges the stored credentials for a fresh token.
    pub async fn authenticate(&mut self) -> Result<()> {
        let auth_path = self.profile.auth_path();
        let body = protocol::auth_body(
            &self.session.username,
            &self.session.password,
            &self.session.app_id,
        );
        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", auth_path, Some(&body));
        }

        let url = format!("{}{}", self.base_url, auth_path);
        debug!(url = %url, "authenticating");
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Auth(format!(
                "service returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed session response: {e}")))?;
        let outcome = protocol::parse_auth_response(self.profile, &payload).map_err(Error::Auth)?;
        debug!(user_id = %outcome.user_id, "authenticated");
        self.session
            .store(outcome.token, outcome.user_id, outcome.ttl);
        Ok(())
    }

    async fn ensure_valid(&mut self) -> Result<()> {
        if self.session.valid_token().is_none() {
            self.authenticate().await?;
        }
        Ok(())
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.valid_token() {
            Some(token) => match self.profile {
                ApiProfile::Legacy => req.header("sessionId", token.value.clone()),
                ApiProfile::Emea => req.bearer_auth(&token.value),
            },
            None => req,
        }
    }

    async fn get_json(&mut self, path: &str) -> Result<Value> {
        self.ensure_valid().await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", path, None);
        }
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn put_json(&mut self, path: &str, body: &Value) -> Result<reqwest::Response> {
        self.ensure_valid().await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_request("PUT", path, Some(body));
        }
        let url = format!("{}{}", self.base_url, path);
        Ok(self.authed(self.http.put(&url)).json(body).send().await?)
    }

    /// Builds the device tree, fetching it if absent or when forced.
    ///
    /// A malformed locations response is the expired-session signal:
    /// discovery re-authenticates and retries exactly once before
    /// surfacing the error. The replacement tree is built completely
    /// before it is swapped in.
    pub async fn discover(&mut self, force_refresh: bool) -> Result<&DeviceTree> {
        if self.tree.is_none() || force_refresh {
            let locations = match self.fetch_locations().await {
                Ok(locations) => locations,
                Err(Error::Discovery(reason)) => {
                    debug!(%reason, "malformed locations response, refreshing session");
                    self.session.invalidate();
                    self.fetch_locations().await?
                }
                Err(other) => return Err(other),
            };
            debug!(
                locations = locations.len(),
                devices = locations.iter().map(|l| l.devices.len()).sum::<usize>(),
                "discovered device tree"
            );
            self.tree = Some(DeviceTree { locations });
        }
        Ok(self.tree.as_ref().expect("tree populated above"))
    }

    async fn fetch_locations(&mut self) -> Result<Vec<Location>> {
        self.ensure_valid().await?;
        let user_id = self
            .session
            .valid_token()
            .map(|t| t.user_id.clone())
            .unwrap_or_default();
        let path = self.profile.locations_path(&user_id);
        let body = self.get_json(&path).await?;
        protocol::decode_locations(self.profile, &body).map_err(Error::Discovery)
    }

    /// The current tree snapshot, if discovery has run.
    pub fn tree(&self) -> Option<&DeviceTree> {
        self.tree.as_ref()
    }

    /// One reading per device, re-derived from the latest tree snapshot on
    /// every call.
    pub async fn temperatures(&mut self) -> Result<Vec<TemperatureReading>> {
        let tree = self.discover(false).await?;
        Ok(tree.temperatures().collect())
    }

    /// Local weather for the account's first location reporting any.
    /// Always refreshes the tree first.
    pub async fn weather(&mut self) -> Result<WeatherSnapshot> {
        let tree = self.discover(true).await?;
        tree.locations
            .iter()
            .find_map(|l| l.weather.clone())
            .ok_or_else(|| Error::Discovery("no weather data for any location".to_string()))
    }

    pub async fn allowed_modes(&mut self, zone: ZoneRef<'_>) -> Result<Vec<String>> {
        self.discover(false).await?;
        Ok(self.resolve_device(zone)?.allowed_modes)
    }

    fn resolve_device(&self, zone: ZoneRef<'_>) -> Result<Device> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::Discovery("device tree not discovered".to_string()))?;
        let found = match zone {
            ZoneRef::Id(id) => tree.device_by_id(id),
            ZoneRef::Name(name) => tree.device_by_name(name),
        };
        found.cloned().ok_or_else(|| {
            Error::UnknownDevice(match zone {
                ZoneRef::Id(s) | ZoneRef::Name(s) => s.to_string(),
            })
        })
    }

    fn first_system_id(&self) -> Result<String> {
        self.tree
            .as_ref()
            .and_then(|t| t.locations.first())
            .map(|l| l.system_id.clone())
            .ok_or_else(|| Error::Discovery("no locations discovered".to_string()))
    }

    /// Issues a state-changing request and returns its task handle without
    /// waiting for completion.
    ///
    /// `target_id` is the control-system/location id for
    /// [`Command::SetSystemMode`] and the device id for everything else.
    pub async fn dispatch(&mut self, target_id: &str, command: &Command) -> Result<TaskHandle> {
        self.discover(false).await?;
        let (path, payload) = self.command_request(target_id, command)?;
        let resp = self.put_json(&path, &payload).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::CommandRejected {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        let id = protocol::extract_task_id(&body).ok_or_else(|| Error::CommandRejected {
            status: status.as_u16(),
            body: body.to_string(),
        })?;
        debug!(task = %id, "command accepted");
        Ok(TaskHandle { id })
    }

    fn command_request(&self, target_id: &str, command: &Command) -> Result<(String, Value)> {
        match command {
            Command::SetSystemMode { mode, until } => Ok((
                self.profile.system_mode_path(target_id),
                protocol::system_mode_data(self.profile, *mode, *until),
            )),
            Command::SetZoneSetpoint { value, until } => Ok((
                self.profile.setpoint_path(target_id),
                protocol::setpoint_data(self.profile, *value, *until),
            )),
            Command::CancelZoneOverride => Ok((
                self.profile.setpoint_path(target_id),
                protocol::cancel_override_data(self.profile),
            )),
            Command::SetHotWaterState { state, until } => Ok((
                self.profile.hot_water_path(target_id),
                protocol::hot_water_data(self.profile, *state, *until),
            )),
            Command::SetSchedule(weekly) => {
                let kind = self
                    .tree
                    .as_ref()
                    .and_then(|t| t.device_by_id(target_id))
                    .map(|d| d.kind)
                    .unwrap_or_default();
                Ok((
                    self.profile.schedule_path(kind, target_id),
                    schedule::encode(weekly)?,
                ))
            }
        }
    }

    /// Polls the task until the service reports the terminal `Succeeded`
    /// state; any other status (including an unparseable one) is
    /// non-terminal and polled again after the policy interval.
    ///
    /// With the default policy this blocks indefinitely on a task the
    /// service never completes, matching the observed service contract.
    /// Bound the wait with [`PollPolicy::timeout`], or drop this future to
    /// cancel between polls.
    pub async fn await_completion(&mut self, task: &TaskHandle) -> Result<String> {
        let policy = self.poll_policy;
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            let path = self.profile.task_status_path(&task.id);
            let body = self.get_json(&path).await?;
            let state = protocol::extract_task_state(&body).unwrap_or("").to_string();
            if let Some(ref mut logger) = self.logger {
                logger.log_task_poll(&task.id, attempt, &state);
            }
            if state == TASK_SUCCEEDED {
                debug!(task = %task.id, polls = attempt + 1, "task succeeded");
                return Ok(state);
            }
            trace!(task = %task.id, %state, "task not terminal yet");
            if let Some(timeout) = policy.timeout
                && started.elapsed() >= timeout
            {
                return Err(Error::TaskTimeout {
                    task_id: task.id.clone(),
                    waited: started.elapsed(),
                });
            }
            attempt += 1;
            tokio::time::sleep(policy.interval).await;
        }
    }

    // -- Convenience mutators: dispatch and wait --

    /// Sets the system mode on the first discovered location.
    pub async fn set_system_mode(
        &mut self,
        mode: SystemMode,
        until: Option<NaiveDate>,
    ) -> Result<()> {
        self.discover(false).await?;
        let target = self.first_system_id()?;
        let task = self
            .dispatch(&target, &Command::SetSystemMode { mode, until })
            .await?;
        self.await_completion(&task).await?;
        Ok(())
    }

    pub async fn set_zone_setpoint(
        &mut self,
        zone: ZoneRef<'_>,
        value: f64,
        until: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.discover(false).await?;
        let device = self.resolve_device(zone)?;
        let task = self
            .dispatch(&device.id, &Command::SetZoneSetpoint { value, until })
            .await?;
        self.await_completion(&task).await?;
        Ok(())
    }

    pub async fn cancel_zone_override(&mut self, zone: ZoneRef<'_>) -> Result<()> {
        self.discover(false).await?;
        let device = self.resolve_device(zone)?;
        let task = self.dispatch(&device.id, &Command::CancelZoneOverride).await?;
        self.await_completion(&task).await?;
        Ok(())
    }

    /// Targets the installation's hot-water device.
    pub async fn set_hot_water(
        &mut self,
        state: HotWaterState,
        until: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.discover(false).await?;
        let dhw = self
            .tree
            .as_ref()
            .and_then(|t| t.hot_water())
            .cloned()
            .ok_or_else(|| Error::UnknownDevice("no hot-water device".to_string()))?;
        let task = self
            .dispatch(&dhw.id, &Command::SetHotWaterState { state, until })
            .await?;
        self.await_completion(&task).await?;
        Ok(())
    }

    /// Fetches and normalizes a device's weekly schedule.
    pub async fn schedule(&mut self, zone: ZoneRef<'_>) -> Result<WeeklySchedule> {
        self.discover(false).await?;
        let device = self.resolve_device(zone)?;
        let path = self.profile.schedule_path(device.kind, &device.id);
        let body = self.get_json(&path).await?;
        schedule::decode(&body)
    }

    pub async fn set_schedule(
        &mut self,
        zone: ZoneRef<'_>,
        weekly: &WeeklySchedule,
    ) -> Result<()> {
        self.discover(false).await?;
        let device = self.resolve_device(zone)?;
        let task = self
            .dispatch(&device.id, &Command::SetSchedule(weekly.clone()))
            .await?;
        self.await_completion(&task).await?;
        Ok(())
    }

    /// Whether the zone's live setpoint currently deviates from its weekly
    /// schedule. Uses the UTC wall clock; the location's UTC offset is not
    /// applied.
    pub async fn is_overridden(&mut self, zone: ZoneRef<'_>) -> Result<bool> {
        self.discover(false).await?;
        let device = self.resolve_device(zone)?;
        let live = device.setpoint.ok_or_else(|| {
            Error::Discovery(format!("device {} reports no setpoint", device.id))
        })?;
        let weekly = {
            let path = self.profile.schedule_path(device.kind, &device.id);
            let body = self.get_json(&path).await?;
            schedule::decode(&body)?
        };
        Ok(schedule::is_overridden(
            &weekly,
            live,
            Utc::now().naive_utc(),
            self.boundary_rule,
        ))
    }

    // -- Schedule backup / restore --

    /// Writes every device's schedule to a JSON document mapping device id
    /// to `{name, schedule}`.
    pub async fn schedules_backup(&mut self, path: &Path) -> Result<()> {
        self.discover(false).await?;
        let devices: Vec<Device> = self
            .tree
            .as_ref()
            .expect("tree populated by discover")
            .locations
            .iter()
            .flat_map(|l| l.devices.clone())
            .collect();

        info!(path = %path.display(), devices = devices.len(), "backing up schedules");
        let mut backup: BTreeMap<String, ScheduleBackupEntry> = BTreeMap::new();
        for device in devices {
            info!(id = %device.id, name = %device.name, "retrieving schedule");
            let sched_path = self.profile.schedule_path(device.kind, &device.id);
            let body = self.get_json(&sched_path).await?;
            let weekly = schedule::decode(&body)?;
            backup.insert(
                device.id,
                ScheduleBackupEntry {
                    name: device.name,
                    schedule: schedule::encode(&weekly)?,
                },
            );
        }

        let doc = serde_json::to_string_pretty(&backup)
            .map_err(|e| Error::InvalidScheduleData(e.to_string()))?;
        std::fs::write(path, doc)?;
        info!(path = %path.display(), "schedules backed up");
        Ok(())
    }

    /// Restores schedules from a document written by
    /// [`schedules_backup`](Self::schedules_backup), one task-polled write
    /// per device.
    pub async fn schedules_restore(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let backup: BTreeMap<String, ScheduleBackupEntry> =
            serde_json::from_str(&raw).map_err(|e| Error::InvalidScheduleData(e.to_string()))?;

        info!(path = %path.display(), entries = backup.len(), "restoring schedules");
        for (id, entry) in backup {
            info!(id = %id, name = %entry.name, "restoring schedule");
            let weekly = schedule::decode(&entry.schedule)?;
            self.set_schedule(ZoneRef::Id(&id), &weekly).await?;
        }
        Ok(())
    }
}
