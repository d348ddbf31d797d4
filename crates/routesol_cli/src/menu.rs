//! Console menu driver.
//!
//! # Responsibility
//! - Authenticate the operator, then dispatch one store operation per choice.
//! - Render operation results and failures as text.
//!
//! # Invariants
//! - A failed operation is reported and the loop continues; only console I/O
//!   errors end the session.
//! - Login is limited to `MAX_LOGIN_ATTEMPTS` per session.

use crate::import;
use log::info;
use routesol_core::{
    CredentialService, DeleteManyOutcome, DeleteScope, LoadCombination, LoginGate, LoginStatus,
    Password, Restrictions, StoreId, StoreInput, StoreRecord, StoreService, TrailerZone,
    WarehouseArea, Weekday,
};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::Path;

const LOG_TARGET: &str = "routesol::console";

/// Interactive session over line-based input and text output.
pub struct Session<'a, R, W> {
    stores: &'a StoreService,
    users: &'a CredentialService,
    input: R,
    output: W,
    /// Read passwords from the terminal without echo.
    mask_secrets: bool,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(
        stores: &'a StoreService,
        users: &'a CredentialService,
        input: R,
        output: W,
        mask_secrets: bool,
    ) -> Self {
        Self {
            stores,
            users,
            input,
            output,
            mask_secrets,
        }
    }

    /// Runs until the operator quits, input ends or login is locked.
    pub fn run(&mut self) -> io::Result<()> {
        info!(target: LOG_TARGET, "event=session_start module=console status=ok");
        if self.authenticate()? {
            self.operations()?;
        }
        info!(target: LOG_TARGET, "event=session_end module=console status=ok");
        Ok(())
    }

    fn authenticate(&mut self) -> io::Result<bool> {
        let mut gate = LoginGate::default();
        loop {
            writeln!(self.output, "\n1. Register")?;
            writeln!(self.output, "2. Login")?;
            writeln!(self.output, "0. Quit")?;
            let Some(choice) = self.prompt("Choose an option: ")? else {
                return Ok(false);
            };
            match choice.as_str() {
                "1" => self.register()?,
                "2" => match self.login(&mut gate)? {
                    Some(LoginStatus::Granted) => return Ok(true),
                    Some(LoginStatus::Locked) => {
                        writeln!(self.output, "Too many failed login attempts.")?;
                        return Ok(false);
                    }
                    Some(LoginStatus::Denied { .. }) => {}
                    None => return Ok(false),
                },
                "0" => return Ok(false),
                other => writeln!(self.output, "Invalid choice `{other}`.")?,
            }
        }
    }

    fn register(&mut self) -> io::Result<()> {
        let Some(username) = self.prompt("Username: ")? else {
            return Ok(());
        };
        let Some(password) = self.secret("Password: ")? else {
            return Ok(());
        };
        let Some(confirm) = self.secret("Confirm password: ")? else {
            return Ok(());
        };
        match self.users.register(&username, &password, &confirm) {
            Ok(_) => writeln!(self.output, "User `{}` registered.", username.trim()),
            Err(err) => writeln!(self.output, "Registration failed: {err}"),
        }
    }

    /// One login attempt; `None` when input ended.
    fn login(&mut self, gate: &mut LoginGate) -> io::Result<Option<LoginStatus>> {
        if !gate.allows_attempt() {
            return Ok(Some(LoginStatus::Locked));
        }
        let Some(username) = self.prompt("Username: ")? else {
            return Ok(None);
        };
        let Some(password) = self.secret("Password: ")? else {
            return Ok(None);
        };
        let granted = match self.users.login(&username, &password) {
            Ok(granted) => granted,
            Err(err) => {
                writeln!(self.output, "Login failed: {err}")?;
                false
            }
        };
        let status = gate.record(granted);
        match status {
            LoginStatus::Granted => writeln!(self.output, "Welcome, {}.", username.trim())?,
            LoginStatus::Denied { remaining } => writeln!(
                self.output,
                "Invalid username or password. {remaining} attempt(s) left."
            )?,
            LoginStatus::Locked => {}
        }
        Ok(Some(status))
    }

    fn operations(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "\n1. Insert one store")?;
            writeln!(self.output, "2. Import stores from file")?;
            writeln!(self.output, "3. Find store by ID")?;
            writeln!(self.output, "4. List all stores")?;
            writeln!(self.output, "5. Delete one store")?;
            writeln!(self.output, "6. Delete many stores")?;
            writeln!(self.output, "7. Update store restrictions")?;
            writeln!(self.output, "8. Show cargo groupings")?;
            writeln!(self.output, "0. Quit")?;
            let Some(choice) = self.prompt("Choose an option: ")? else {
                return Ok(());
            };
            match choice.as_str() {
                "1" => self.insert_one()?,
                "2" => self.import_many()?,
                "3" => self.find_one()?,
                "4" => self.list_all()?,
                "5" => self.delete_one()?,
                "6" => self.delete_many()?,
                "7" => self.update_restrictions()?,
                "8" => self.show_groupings()?,
                "0" => return Ok(()),
                other => writeln!(self.output, "Invalid choice `{other}`.")?,
            }
        }
    }

    fn insert_one(&mut self) -> io::Result<()> {
        let mut fields = Vec::with_capacity(6);
        for label in [
            "Store ID (blank to generate): ",
            "Store name: ",
            "Store address: ",
            "Store postcode: ",
            "Kilometers: ",
            "Requires tail lift? (true/false): ",
        ] {
            let Some(value) = self.prompt(label)? else {
                return Ok(());
            };
            fields.push(value);
        }

        let input = StoreInput {
            id: optional_text(&fields[0]),
            name: Value::from(fields[1].as_str()),
            address: Value::from(fields[2].as_str()),
            postcode: Value::from(fields[3].as_str()),
            distance_km: number_or_text(&fields[4]),
            requires_tail_lift: bool_or_text(&fields[5]),
        };
        match self.stores.insert_one(&input) {
            Ok(id) => writeln!(self.output, "Inserted store `{id}`."),
            Err(err) => writeln!(self.output, "Insert failed: {err}"),
        }
    }

    fn import_many(&mut self) -> io::Result<()> {
        let Some(path) = self.prompt("Path to JSON import file: ")? else {
            return Ok(());
        };
        let rows = match import::read_rows(Path::new(&path)) {
            Ok(rows) => rows,
            Err(err) => return writeln!(self.output, "Import failed: {err}"),
        };
        match self.stores.insert_many(rows) {
            Ok(report) => {
                writeln!(
                    self.output,
                    "Imported {} of {} row(s).",
                    report.inserted.len(),
                    report.attempted()
                )?;
                for failure in &report.failures {
                    writeln!(self.output, "  row {} skipped: {}", failure.row, failure.error)?;
                }
                Ok(())
            }
            Err(err) => writeln!(self.output, "Import failed: {err}"),
        }
    }

    fn find_one(&mut self) -> io::Result<()> {
        let Some(id) = self.store_id("Store ID: ")? else {
            return Ok(());
        };
        match self.stores.find_by_id(&id) {
            Ok(Some(record)) => writeln!(self.output, "{}", describe(&record)),
            Ok(None) => writeln!(self.output, "Store `{id}` not found."),
            Err(err) => writeln!(self.output, "Search failed: {err}"),
        }
    }

    fn list_all(&mut self) -> io::Result<()> {
        match self.stores.find_all() {
            Ok(records) if records.is_empty() => writeln!(self.output, "No stores found."),
            Ok(records) => {
                for record in &records {
                    writeln!(self.output, "{}", describe(record))?;
                }
                writeln!(self.output, "{} store(s).", records.len())
            }
            Err(err) => writeln!(self.output, "Listing failed: {err}"),
        }
    }

    fn delete_one(&mut self) -> io::Result<()> {
        let Some(id) = self.store_id("Store ID to delete: ")? else {
            return Ok(());
        };
        match self.stores.delete_one(&id) {
            Ok(0) => writeln!(self.output, "Store `{id}` not found; nothing deleted."),
            Ok(deleted) => writeln!(self.output, "Deleted {deleted} store(s)."),
            Err(err) => writeln!(self.output, "Delete failed: {err}"),
        }
    }

    fn delete_many(&mut self) -> io::Result<()> {
        let Some(scope) = self.prompt("Enter 'all' to delete every store: ")? else {
            return Ok(());
        };
        let scope = DeleteScope::parse(&scope);
        let stores = self.stores;
        let outcome = stores.delete_many(&scope, |count| {
            let question = format!("Delete all {count} store(s)? (y/n): ");
            matches!(self.prompt(&question), Ok(Some(answer)) if answer.eq_ignore_ascii_case("y"))
        });
        match outcome {
            Ok(DeleteManyOutcome::Deleted(deleted)) => {
                writeln!(self.output, "Deleted {deleted} store(s).")
            }
            Ok(DeleteManyOutcome::Cancelled { remaining }) => writeln!(
                self.output,
                "Deletion cancelled; {remaining} store(s) remain."
            ),
            Ok(DeleteManyOutcome::Unsupported {
                criteria,
                remaining,
            }) => writeln!(
                self.output,
                "Deleting by criteria `{criteria}` is not supported; {remaining} store(s) remain."
            ),
            Err(err) => writeln!(self.output, "Delete failed: {err}"),
        }
    }

    fn update_restrictions(&mut self) -> io::Result<()> {
        let Some(id) = self.store_id("Store ID: ")? else {
            return Ok(());
        };
        let mut restrictions = Restrictions::new();
        for day in Weekday::ALL {
            let Some(hours) = self.prompt(&format!("{day} hours (blank for none): "))? else {
                return Ok(());
            };
            if !hours.is_empty() {
                restrictions.insert(day, hours);
            }
        }
        match self.stores.update_restrictions(&id, &restrictions) {
            Ok(()) => writeln!(self.output, "Restrictions updated for store `{id}`."),
            Err(err) => writeln!(self.output, "Update failed: {err}"),
        }
    }

    fn show_groupings(&mut self) -> io::Result<()> {
        writeln!(self.output, "Warehouse areas:")?;
        for area in WarehouseArea::ALL {
            writeln!(
                self.output,
                "  {:>2}  {:<20} {}",
                area.product_group(),
                area.label(),
                area.temperature()
            )?;
        }
        writeln!(self.output, "Load combinations:")?;
        for combination in LoadCombination::ALL {
            let areas: Vec<&str> = combination.areas().iter().map(|area| area.label()).collect();
            writeln!(self.output, "  {:<4} {}", combination.code(), areas.join(", "))?;
        }
        let zones: Vec<&str> = TrailerZone::ALL.iter().map(|zone| zone.as_str()).collect();
        writeln!(self.output, "Trailer zones: {}", zones.join(", "))?;
        Ok(())
    }

    /// Prompts for an id until input ends or a non-blank id is given.
    fn store_id(&mut self, label: &str) -> io::Result<Option<StoreId>> {
        loop {
            let Some(raw) = self.prompt(label)? else {
                return Ok(None);
            };
            match StoreId::parse(&raw) {
                Ok(id) => return Ok(Some(id)),
                Err(err) => writeln!(self.output, "{err}")?,
            }
        }
    }

    /// Reads one trimmed line; `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn secret(&mut self, label: &str) -> io::Result<Option<Password>> {
        if self.mask_secrets {
            return rpassword::prompt_password(label).map(|value| Some(Password::new(value)));
        }
        Ok(self.prompt(label)?.map(Password::new))
    }
}

fn optional_text(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::from(value)
    }
}

fn number_or_text(value: &str) -> Value {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Value::from(number),
        _ => optional_text(value),
    }
}

fn bool_or_text(value: &str) -> Value {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => Value::Bool(true),
        "false" | "no" | "n" => Value::Bool(false),
        _ => optional_text(value),
    }
}

fn describe(record: &StoreRecord) -> String {
    let mut text = format!(
        "[{}] {} | {} | {} | {} km | tail lift: {}",
        record.id,
        record.name,
        record.address,
        record.postcode,
        record.distance_km,
        if record.requires_tail_lift { "yes" } else { "no" }
    );
    if let Some(restrictions) = &record.restrictions {
        for (day, hours) in restrictions {
            text.push_str(&format!("\n    {day}: {hours}"));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::Session;
    use routesol_core::{
        Channel, ConnectionManager, CredentialService, LogContext, StoreId, StoreService,
    };
    use std::io::Cursor;
    use tempfile::TempDir;

    fn services() -> (TempDir, StoreService, CredentialService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.sqlite3");
        let logs = LogContext::detached();
        let manager =
            ConnectionManager::new(path.to_str().unwrap(), logs.channel(Channel::Connection))
                .unwrap();
        let stores = StoreService::new(manager.clone(), "StoreInformation", &logs);
        let users = CredentialService::new(manager, "UserInformation", &logs);
        (dir, stores, users)
    }

    fn run_script(stores: &StoreService, users: &CredentialService, script: &str) -> String {
        let mut output = Vec::new();
        Session::new(stores, users, Cursor::new(script.as_bytes()), &mut output, false)
            .run()
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn register_login_insert_and_find() {
        let (_dir, stores, users) = services();
        let script = "1\namy\npw\npw\n\
                      2\namy\npw\n\
                      1\n1\nAcme\n1 Main St\nAB1 2CD\n4.2\ntrue\n\
                      3\n1\n\
                      0\n";

        let output = run_script(&stores, &users, script);

        assert!(output.contains("User `amy` registered."));
        assert!(output.contains("Welcome, amy."));
        assert!(output.contains("Inserted store `1`."));
        assert!(output.contains("[1] Acme | 1 Main St | AB1 2CD | 4.2 km | tail lift: yes"));
        assert!(stores.find_by_id(&StoreId::Int(1)).unwrap().is_some());
    }

    #[test]
    fn login_locks_after_three_failures() {
        let (_dir, stores, users) = services();
        let script = "2\nghost\nx\n2\nghost\nx\n2\nghost\nx\n2\nghost\nx\n";

        let output = run_script(&stores, &users, script);

        assert!(output.contains("2 attempt(s) left."));
        assert!(output.contains("1 attempt(s) left."));
        assert!(output.contains("Too many failed login attempts."));
        assert!(!output.contains("Welcome"));
    }

    #[test]
    fn failed_operations_do_not_end_the_session() {
        let (_dir, stores, users) = services();
        let script = "1\namy\npw\npw\n2\namy\npw\n\
                      1\n5\nBad\nSomewhere\nZZ1\n3\nmaybe\n\
                      5\n99\n\
                      6\nall\nn\n\
                      7\n42\n\n\n\n\n\n\n\n\
                      4\n\
                      0\n";

        let output = run_script(&stores, &users, script);

        assert!(output.contains("Insert failed: validation failed"));
        assert!(output.contains("Store `99` not found; nothing deleted."));
        assert!(output.contains("Deletion cancelled; 0 store(s) remain."));
        assert!(output.contains("Update failed: store `42` not found"));
        assert!(output.contains("No stores found."));
    }

    #[test]
    fn groupings_list_areas_combinations_and_zones() {
        let (_dir, stores, users) = services();
        let script = "1\namy\npw\npw\n2\namy\npw\n8\n0\n";

        let output = run_script(&stores, &users, script);

        assert!(output.contains("60  Freezer"));
        assert!(output.contains("-28..-18 °C"));
        assert!(output.contains("FBZ  Bread, Fruit and Veg, Flowers and Plants, Freezer"));
        assert!(output.contains("Trailer zones: Front, Back"));
    }

    #[test]
    fn mismatched_registration_is_reported() {
        let (_dir, stores, users) = services();
        let output = run_script(&stores, &users, "1\namy\none\ntwo\n0\n");
        assert!(output.contains("Registration failed: passwords do not match"));
    }
}
