//! Canonical statement catalog
//!
//! Every statement the dashboard backend runs, defined in one place with
//! its declared result schema, so maintenance and review happen centrally
//! rather than inside route handlers.
//!
//! Naming convention follows the operation: `list`/`by_*` for reads,
//! `insert`/`update_*`/`delete` for writes.

use crate::statement::Statement;

/// User account statements.
pub mod users {
    use super::Statement;

    /// Role given to self-registered accounts.
    pub const DEFAULT_ROLE: &str = "user";
    /// Manager-verification flag for new accounts.
    pub const DEFAULT_MANAGER_VERIFIED: &str = "N";

    /// Result schema for full user lookups.
    pub const COLUMNS: &[&str] = &[
        "USER_ID",
        "USER_SOEID",
        "USER_NAME",
        "MANAGER_SOEID",
        "MANAGER_ID",
        "USER_ROLE",
        "USER_PASSWORD",
        "USER_TEAMID",
        "ZEPHYR_PROJECTID",
        "JIRA_PROJECTID",
        "LAST_LOGIN",
        "MANAGER_VERIFIED",
        "ZEPHYR_PROJECTLIST",
        "CURR_VERSION",
        "LIB_FLAG",
    ];

    /// Login lookup: credentials plus profile by SOEID.
    pub fn by_soeid(soeid: &str) -> Statement {
        Statement::read(
            "SELECT USER_ID, USER_SOEID, USER_NAME, MANAGER_SOEID, MANAGER_ID, \
             USER_ROLE, USER_PASSWORD, USER_TEAMID, ZEPHYR_PROJECTID, JIRA_PROJECTID, \
             LAST_LOGIN, MANAGER_VERIFIED, ZEPHYR_PROJECTLIST, CURR_VERSION, LIB_FLAG \
             FROM USERS WHERE USER_SOEID = :soeid",
            COLUMNS,
        )
        .bind("soeid", soeid)
    }

    /// Profile lookup by primary key.
    pub fn by_id(user_id: i64) -> Statement {
        Statement::read(
            "SELECT USER_ID, USER_SOEID, USER_NAME, MANAGER_SOEID, MANAGER_ID, \
             USER_ROLE, USER_PASSWORD, USER_TEAMID, ZEPHYR_PROJECTID, JIRA_PROJECTID, \
             LAST_LOGIN, MANAGER_VERIFIED, ZEPHYR_PROJECTLIST, CURR_VERSION, LIB_FLAG \
             FROM USERS WHERE USER_ID = :user_id",
            COLUMNS,
        )
        .bind("user_id", user_id)
    }

    /// Admin listing, ordered by display name.
    pub fn list() -> Statement {
        Statement::read(
            "SELECT USER_ID, USER_SOEID, USER_NAME, USER_ROLE, USER_TEAMID, \
             LAST_LOGIN, MANAGER_VERIFIED FROM USERS ORDER BY USER_NAME",
            &[
                "USER_ID",
                "USER_SOEID",
                "USER_NAME",
                "USER_ROLE",
                "USER_TEAMID",
                "LAST_LOGIN",
                "MANAGER_VERIFIED",
            ],
        )
    }

    /// Registration insert. New accounts get [`DEFAULT_ROLE`] and
    /// [`DEFAULT_MANAGER_VERIFIED`] unless the caller overrides them.
    pub fn insert(
        user_id: i64,
        soeid: &str,
        user_name: &str,
        password_hash: &str,
        team_id: Option<i64>,
    ) -> Statement {
        Statement::write(
            "INSERT INTO USERS (USER_ID, USER_SOEID, USER_NAME, USER_PASSWORD, \
             USER_ROLE, USER_TEAMID, LAST_LOGIN, MANAGER_VERIFIED, CURR_VERSION, LIB_FLAG) \
             VALUES (:user_id, :soeid, :user_name, :password, :role, :team_id, \
             CURRENT_TIMESTAMP, :manager_verified, :version, :lib_flag)",
        )
        .bind("user_id", user_id)
        .bind("soeid", soeid)
        .bind("user_name", user_name)
        .bind("password", password_hash)
        .bind("role", DEFAULT_ROLE)
        .bind("team_id", team_id)
        .bind("manager_verified", DEFAULT_MANAGER_VERIFIED)
        .bind("version", "1.0")
        .bind("lib_flag", "N")
    }

    /// Stamp a successful login.
    pub fn touch_last_login(user_id: i64) -> Statement {
        Statement::write("UPDATE USERS SET LAST_LOGIN = CURRENT_TIMESTAMP WHERE USER_ID = :user_id")
            .bind("user_id", user_id)
    }

    /// Change the stored passcode hash.
    pub fn update_password(user_id: i64, password_hash: &str) -> Statement {
        Statement::write("UPDATE USERS SET USER_PASSWORD = :password WHERE USER_ID = :user_id")
            .bind("user_id", user_id)
            .bind("password", password_hash)
    }

    /// Change a user's role.
    pub fn update_role(user_id: i64, role: &str) -> Statement {
        Statement::write("UPDATE USERS SET USER_ROLE = :role WHERE USER_ID = :user_id")
            .bind("user_id", user_id)
            .bind("role", role)
    }

    /// Store integration tokens for the Zephyr/Jira clients.
    pub fn update_tokens(user_id: i64, zephyr_token: &str, jira_token: &str) -> Statement {
        Statement::write(
            "UPDATE USERS SET ZEPHYR_TOKEN = :zephyr_token, JIRA_TOKEN = :jira_token \
             WHERE USER_ID = :user_id",
        )
        .bind("user_id", user_id)
        .bind("zephyr_token", zephyr_token)
        .bind("jira_token", jira_token)
    }

    /// Next free USER_ID.
    pub fn next_id() -> Statement {
        Statement::read(
            "SELECT COALESCE(MAX(USER_ID), 0) + 1 AS NEXT_ID FROM USERS",
            &["NEXT_ID"],
        )
    }
}

/// Project statements.
pub mod projects {
    use super::Statement;

    pub const COLUMNS: &[&str] = &["PROJECT_ID", "PROJECT_NAME"];

    /// Dropdown listing of every project.
    pub fn list() -> Statement {
        Statement::read(
            "SELECT PROJECT_ID, PROJECT_NAME FROM PROJECTS ORDER BY PROJECT_NAME",
            COLUMNS,
        )
    }

    /// Single project lookup.
    pub fn by_id(project_id: i64) -> Statement {
        Statement::read(
            "SELECT PROJECT_ID, PROJECT_NAME FROM PROJECTS WHERE PROJECT_ID = :project_id",
            COLUMNS,
        )
        .bind("project_id", project_id)
    }

    /// Projects assigned to a user via the comma-separated
    /// ZEPHYR_PROJECTLIST column.
    pub fn for_user(user_id: i64) -> Statement {
        Statement::read(
            "SELECT PROJECT_ID, PROJECT_NAME FROM PROJECTS \
             WHERE FIND_IN_SET(PROJECT_ID, \
             (SELECT ZEPHYR_PROJECTLIST FROM USERS WHERE USER_ID = :user_id)) \
             ORDER BY PROJECT_NAME",
            COLUMNS,
        )
        .bind("user_id", user_id)
    }

    pub fn insert(project_id: i64, project_name: &str) -> Statement {
        Statement::write(
            "INSERT INTO PROJECTS (PROJECT_ID, PROJECT_NAME) VALUES (:project_id, :project_name)",
        )
        .bind("project_id", project_id)
        .bind("project_name", project_name)
    }

    pub fn update(project_id: i64, project_name: &str) -> Statement {
        Statement::write(
            "UPDATE PROJECTS SET PROJECT_NAME = :project_name WHERE PROJECT_ID = :project_id",
        )
        .bind("project_id", project_id)
        .bind("project_name", project_name)
    }

    /// Next free PROJECT_ID.
    pub fn next_id() -> Statement {
        Statement::read(
            "SELECT COALESCE(MAX(PROJECT_ID), 0) + 1 AS NEXT_ID FROM PROJECTS",
            &["NEXT_ID"],
        )
    }
}

/// Release statements.
pub mod releases {
    use super::Statement;

    pub const COLUMNS: &[&str] = &[
        "RELEASE_ID",
        "PROJECT_ID",
        "RELEASE_NAME",
        "RELEASE_START_DATE",
        "RELEASE_END_DATE",
        "BUILD_RELEASE",
        "CONFLUENCE_PAGEID",
        "CONFLUENCE_TOKEN",
        "CONF_UPDATE",
        "CONFTEAM_NAME",
        "CONFEND_DATE",
    ];

    /// Release dropdown for a project, most recent first.
    pub fn for_project(project_id: i64) -> Statement {
        Statement::read(
            "SELECT RELEASE_ID, PROJECT_ID, RELEASE_NAME, RELEASE_START_DATE, \
             RELEASE_END_DATE, BUILD_RELEASE, CONFLUENCE_PAGEID, CONFLUENCE_TOKEN, \
             CONF_UPDATE, CONFTEAM_NAME, CONFEND_DATE \
             FROM RELEASES WHERE PROJECT_ID = :project_id \
             ORDER BY RELEASE_START_DATE DESC",
            COLUMNS,
        )
        .bind("project_id", project_id)
    }

    pub fn by_id(release_id: i64) -> Statement {
        Statement::read(
            "SELECT RELEASE_ID, PROJECT_ID, RELEASE_NAME, RELEASE_START_DATE, \
             RELEASE_END_DATE, BUILD_RELEASE, CONFLUENCE_PAGEID, CONFLUENCE_TOKEN, \
             CONF_UPDATE, CONFTEAM_NAME, CONFEND_DATE \
             FROM RELEASES WHERE RELEASE_ID = :release_id",
            COLUMNS,
        )
        .bind("release_id", release_id)
    }

    /// Fields for release creation; dates are `YYYY-MM-DD` strings.
    #[derive(Debug, Clone)]
    pub struct NewRelease {
        pub release_id: i64,
        pub project_id: i64,
        pub release_name: String,
        pub start_date: String,
        pub end_date: String,
        pub build_release: Option<String>,
        pub confluence_pageid: Option<String>,
        pub confluence_token: Option<String>,
        pub confteam_name: Option<String>,
        pub confend_date: Option<String>,
    }

    pub fn insert(release: &NewRelease) -> Statement {
        Statement::write(
            "INSERT INTO RELEASES (RELEASE_ID, PROJECT_ID, RELEASE_NAME, \
             RELEASE_START_DATE, RELEASE_END_DATE, BUILD_RELEASE, CONFLUENCE_PAGEID, \
             CONFLUENCE_TOKEN, CONF_UPDATE, CONFTEAM_NAME, CONFEND_DATE) \
             VALUES (:release_id, :project_id, :release_name, :start_date, :end_date, \
             :build_release, :confluence_pageid, :confluence_token, CURRENT_TIMESTAMP, \
             :confteam_name, :confend_date)",
        )
        .bind("release_id", release.release_id)
        .bind("project_id", release.project_id)
        .bind("release_name", release.release_name.as_str())
        .bind("start_date", release.start_date.as_str())
        .bind("end_date", release.end_date.as_str())
        .bind("build_release", release.build_release.clone())
        .bind("confluence_pageid", release.confluence_pageid.clone())
        .bind("confluence_token", release.confluence_token.clone())
        .bind("confteam_name", release.confteam_name.clone())
        .bind("confend_date", release.confend_date.clone())
    }

    pub fn update(
        release_id: i64,
        release_name: &str,
        start_date: &str,
        end_date: &str,
        build_release: Option<&str>,
    ) -> Statement {
        Statement::write(
            "UPDATE RELEASES SET RELEASE_NAME = :release_name, \
             RELEASE_START_DATE = :start_date, RELEASE_END_DATE = :end_date, \
             BUILD_RELEASE = :build_release, CONF_UPDATE = CURRENT_TIMESTAMP \
             WHERE RELEASE_ID = :release_id",
        )
        .bind("release_id", release_id)
        .bind("release_name", release_name)
        .bind("start_date", start_date)
        .bind("end_date", end_date)
        .bind("build_release", build_release.map(str::to_string))
    }

    pub fn delete(release_id: i64) -> Statement {
        Statement::write("DELETE FROM RELEASES WHERE RELEASE_ID = :release_id")
            .bind("release_id", release_id)
    }

    /// Releases whose window covers today.
    pub fn active() -> Statement {
        Statement::read(
            "SELECT RELEASE_ID, PROJECT_ID, RELEASE_NAME, RELEASE_START_DATE, RELEASE_END_DATE \
             FROM RELEASES WHERE CURRENT_DATE BETWEEN RELEASE_START_DATE AND RELEASE_END_DATE \
             ORDER BY RELEASE_START_DATE DESC",
            &[
                "RELEASE_ID",
                "PROJECT_ID",
                "RELEASE_NAME",
                "RELEASE_START_DATE",
                "RELEASE_END_DATE",
            ],
        )
    }

    /// Next free RELEASE_ID.
    pub fn next_id() -> Statement {
        Statement::read(
            "SELECT COALESCE(MAX(RELEASE_ID), 0) + 1 AS NEXT_ID FROM RELEASES",
            &["NEXT_ID"],
        )
    }
}

/// Dashboard statistics.
///
/// The live queries are placeholders until the test-case, execution, and
/// defect tables land; the declared schemas already carry the stat names
/// the dashboards render, so missing columns surface as explicit nulls. In
/// mock mode the fixture backend serves the full canned numbers.
pub mod dashboard {
    use super::Statement;

    pub const ZEPHYR_COLUMNS: &[&str] = &[
        "TOTAL_TEST_CASES",
        "EXECUTION_RATE",
        "PASS_RATE",
        "OPEN_DEFECTS",
        "ACTIVE_CYCLES",
        "REQUIREMENTS",
    ];

    pub const JIRA_COLUMNS: &[&str] = &[
        "OPEN_ISSUES",
        "IN_PROGRESS",
        "RESOLVED",
        "BACKLOG_ITEMS",
        "SPRINT_PROGRESS",
        "TEAM_VELOCITY",
    ];

    pub fn zephyr_stats(project_id: i64, release_id: i64) -> Statement {
        Statement::read(
            "SELECT COUNT(*) AS TOTAL_TEST_CASES, :release_id AS CURRENT_RELEASE_ID \
             FROM RELEASES WHERE PROJECT_ID = :project_id",
            ZEPHYR_COLUMNS,
        )
        .bind("project_id", project_id)
        .bind("release_id", release_id)
    }

    pub fn jira_stats(project_id: i64, release_id: i64) -> Statement {
        Statement::read(
            "SELECT COUNT(*) AS OPEN_ISSUES, :release_id AS CURRENT_RELEASE_ID \
             FROM RELEASES WHERE PROJECT_ID = :project_id",
            JIRA_COLUMNS,
        )
        .bind("project_id", project_id)
        .bind("release_id", release_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn read_statements_declare_their_schema() {
        assert_eq!(users::by_soeid("ab123").columns(), users::COLUMNS);
        assert_eq!(projects::list().columns(), projects::COLUMNS);
        assert_eq!(releases::by_id(1).columns(), releases::COLUMNS);
    }

    #[test]
    fn every_catalog_statement_expands() {
        let stmts = vec![
            users::by_soeid("ab123"),
            users::by_id(1),
            users::list(),
            users::insert(1, "ab123", "Alice", "hash", None),
            users::touch_last_login(1),
            users::update_password(1, "hash2"),
            users::update_role(1, "admin"),
            users::update_tokens(1, "zt", "jt"),
            users::next_id(),
            projects::list(),
            projects::by_id(1),
            projects::for_user(1),
            projects::insert(1, "Atlas"),
            projects::update(1, "Atlas 2"),
            projects::next_id(),
            releases::for_project(1),
            releases::by_id(1),
            releases::update(1, "2026.Q1", "2026-01-01", "2026-03-31", Some("B3")),
            releases::delete(1),
            releases::active(),
            releases::next_id(),
            dashboard::zephyr_stats(1, 101),
            dashboard::jira_stats(1, 101),
        ];
        for stmt in stmts {
            stmt.expand().unwrap();
        }
    }

    #[test]
    fn new_users_get_the_default_role() {
        let stmt = users::insert(7, "cd456", "Bob", "hash", Some(3));
        let (_, values) = stmt.expand().unwrap();
        assert!(values.contains(&Value::String(users::DEFAULT_ROLE.into())));
        assert!(values.contains(&Value::String(users::DEFAULT_MANAGER_VERIFIED.into())));
    }

    #[test]
    fn optional_release_fields_bind_as_null() {
        let release = releases::NewRelease {
            release_id: 500,
            project_id: 1,
            release_name: "2026.Q1".into(),
            start_date: "2026-01-01".into(),
            end_date: "2026-03-31".into(),
            build_release: None,
            confluence_pageid: None,
            confluence_token: None,
            confteam_name: None,
            confend_date: None,
        };
        let (_, values) = releases::insert(&release).expand().unwrap();
        assert!(values.iter().any(|v| v.is_null()));
    }
}
