//! In-memory implementations of the core repository ports.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hourmark_domain::{
    Calendar, CalendarEvent, ClassificationRule, DateRange, HourmarkError, Project, Result,
    TimeEntry,
};
use hourmark_core::classification::ports::{EventRepository, ProjectRepository, RuleRepository};
use hourmark_core::sync::ports::CalendarRepository;
use hourmark_core::timesheet::ports::TimeEntryRepository;

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: Mutex<HashMap<String, Project>>,
}

impl InMemoryProjectRepository {
    pub fn with(projects: Vec<Project>) -> Self {
        let map = projects.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self { projects: Mutex::new(map) }
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let guard = self.projects.lock().unwrap();
        let mut out: Vec<Project> =
            guard.values().filter(|p| p.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Option<Project>> {
        let guard = self.projects.lock().unwrap();
        Ok(guard.get(project_id).filter(|p| p.user_id == user_id).cloned())
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut guard = self.projects.lock().unwrap();
        if let Some(code) = project.short_code.as_deref() {
            let collision = guard.values().any(|p| {
                p.user_id == project.user_id
                    && p.id != project.id
                    && p.short_code.as_deref() == Some(code)
            });
            if collision {
                return Err(HourmarkError::Conflict(format!("short code {code} already in use")));
            }
        }
        guard.insert(project.id.clone(), project.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: Mutex<HashMap<String, ClassificationRule>>,
}

impl InMemoryRuleRepository {
    pub fn with(rules: Vec<ClassificationRule>) -> Self {
        let map = rules.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { rules: Mutex::new(map) }
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn list_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>> {
        let guard = self.rules.lock().unwrap();
        let mut out: Vec<ClassificationRule> =
            guard.values().filter(|r| r.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn list_enabled_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>> {
        Ok(self
            .list_rules(user_id)
            .await?
            .into_iter()
            .filter(|r| r.is_enabled)
            .collect())
    }

    async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<ClassificationRule>> {
        let guard = self.rules.lock().unwrap();
        Ok(guard.get(rule_id).filter(|r| r.user_id == user_id).cloned())
    }

    async fn save_rule(&self, rule: &ClassificationRule) -> Result<()> {
        self.rules.lock().unwrap().insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<bool> {
        let mut guard = self.rules.lock().unwrap();
        let owned = guard.get(rule_id).is_some_and(|r| r.user_id == user_id);
        if owned {
            guard.remove(rule_id);
        }
        Ok(owned)
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<String, CalendarEvent>>,
}

impl InMemoryEventRepository {
    pub fn with(events: Vec<CalendarEvent>) -> Self {
        let map = events.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self { events: Mutex::new(map) }
    }

    pub fn snapshot(&self, event_id: &str) -> Option<CalendarEvent> {
        self.events.lock().unwrap().get(event_id).cloned()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn get_event(&self, user_id: &str, event_id: &str) -> Result<Option<CalendarEvent>> {
        let guard = self.events.lock().unwrap();
        Ok(guard.get(event_id).filter(|e| e.user_id == user_id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        let guard = self.events.lock().unwrap();
        Ok(guard
            .values()
            .find(|e| e.calendar_id == calendar_id && e.provider_event_id == provider_event_id)
            .cloned())
    }

    async fn list_events_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>> {
        let guard = self.events.lock().unwrap();
        let mut out: Vec<CalendarEvent> = guard
            .values()
            .filter(|e| e.user_id == user_id && range.contains(e.start))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
        Ok(out)
    }

    async fn list_calendar_events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>> {
        let guard = self.events.lock().unwrap();
        let mut out: Vec<CalendarEvent> = guard
            .values()
            .filter(|e| e.calendar_id == calendar_id && range.contains(e.start))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
        Ok(out)
    }

    async fn save_event(&self, event: &CalendarEvent) -> Result<()> {
        let mut guard = self.events.lock().unwrap();
        // Keep the (calendar, provider event) key unique like the real store
        let duplicate = guard
            .values()
            .find(|e| {
                e.calendar_id == event.calendar_id
                    && e.provider_event_id == event.provider_event_id
                    && e.id != event.id
            })
            .map(|e| e.id.clone());
        if let Some(old_id) = duplicate {
            guard.remove(&old_id);
        }
        guard.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn delete_unreferenced_before(
        &self,
        calendar_id: &str,
        before: DateTime<Utc>,
    ) -> Result<usize> {
        let mut guard = self.events.lock().unwrap();
        let doomed: Vec<String> = guard
            .values()
            .filter(|e| e.calendar_id == calendar_id && e.start < before)
            .map(|e| e.id.clone())
            .collect();
        for id in &doomed {
            guard.remove(id);
        }
        Ok(doomed.len())
    }
}

#[derive(Default)]
pub struct InMemoryTimeEntryRepository {
    entries: Mutex<HashMap<String, TimeEntry>>,
}

impl InMemoryTimeEntryRepository {
    pub fn stale_count(&self) -> usize {
        self.entries.lock().unwrap().values().filter(|e| e.is_stale).count()
    }
}

#[async_trait]
impl TimeEntryRepository for InMemoryTimeEntryRepository {
    async fn list_entries(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let guard = self.entries.lock().unwrap();
        let mut out: Vec<TimeEntry> = guard
            .values()
            .filter(|e| e.user_id == user_id && e.date >= from && e.date <= to)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.date, &a.project_id).cmp(&(b.date, &b.project_id)));
        Ok(out)
    }

    async fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<Option<TimeEntry>> {
        let guard = self.entries.lock().unwrap();
        Ok(guard.get(entry_id).filter(|e| e.user_id == user_id).cloned())
    }

    async fn find_entry(
        &self,
        user_id: &str,
        project_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TimeEntry>> {
        let guard = self.entries.lock().unwrap();
        Ok(guard
            .values()
            .find(|e| e.user_id == user_id && e.project_id == project_id && e.date == date)
            .cloned())
    }

    async fn save_entry(&self, entry: &TimeEntry) -> Result<()> {
        let mut guard = self.entries.lock().unwrap();
        let conflict = guard.values().any(|e| {
            e.user_id == entry.user_id
                && e.project_id == entry.project_id
                && e.date == entry.date
                && e.id != entry.id
        });
        if conflict {
            return Err(HourmarkError::Conflict(format!(
                "time entry already exists for {} on {}",
                entry.project_id, entry.date
            )));
        }
        guard.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_entry(&self, user_id: &str, entry_id: &str) -> Result<bool> {
        let mut guard = self.entries.lock().unwrap();
        let owned = guard.get(entry_id).is_some_and(|e| e.user_id == user_id);
        if owned {
            guard.remove(entry_id);
        }
        Ok(owned)
    }

    async fn mark_stale_for_event(&self, event_id: &str) -> Result<usize> {
        let mut guard = self.entries.lock().unwrap();
        let mut touched = 0;
        for entry in guard.values_mut() {
            if entry.contributing_event_ids.iter().any(|id| id == event_id) && !entry.is_locked() {
                entry.is_stale = true;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[derive(Default)]
pub struct InMemoryCalendarRepository {
    calendars: Mutex<HashMap<String, Calendar>>,
}

impl InMemoryCalendarRepository {
    pub fn with(calendars: Vec<Calendar>) -> Self {
        let map = calendars.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { calendars: Mutex::new(map) }
    }

    pub fn snapshot(&self, calendar_id: &str) -> Option<Calendar> {
        self.calendars.lock().unwrap().get(calendar_id).cloned()
    }
}

#[async_trait]
impl CalendarRepository for InMemoryCalendarRepository {
    async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>> {
        let guard = self.calendars.lock().unwrap();
        let mut out: Vec<Calendar> =
            guard.values().filter(|c| c.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn list_active_calendars(&self) -> Result<Vec<Calendar>> {
        let guard = self.calendars.lock().unwrap();
        let mut out: Vec<Calendar> = guard.values().filter(|c| c.is_active).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn get_calendar(&self, user_id: &str, calendar_id: &str) -> Result<Option<Calendar>> {
        let guard = self.calendars.lock().unwrap();
        Ok(guard.get(calendar_id).filter(|c| c.user_id == user_id).cloned())
    }

    async fn save_calendar(&self, calendar: &Calendar) -> Result<()> {
        self.calendars.lock().unwrap().insert(calendar.id.clone(), calendar.clone());
        Ok(())
    }
}
