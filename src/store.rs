use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params};
use tracing::info;

use crate::pipeline::Inputs;
use crate::records::{RankingSnapshot, ResultRow, Scope};
use crate::roles::{Fixture, RoundFlip};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let mut ddl = String::from(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            season INTEGER NOT NULL,
            league_match INTEGER NOT NULL,
            home_role TEXT NOT NULL,
            team_1 TEXT NOT NULL,
            team_2 TEXT NOT NULL,
            outcome TEXT NOT NULL,
            PRIMARY KEY (season, league_match, team_1, team_2)
        );
        "#,
    );
    for scope in Scope::ALL {
        let table = scope.table_name();
        ddl.push_str(&format!(
            r#"
        CREATE TABLE IF NOT EXISTS {table} (
            season INTEGER NOT NULL,
            league_match INTEGER NOT NULL,
            team TEXT NOT NULL,
            rank_position INTEGER NOT NULL,
            matches_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            draws INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            goals_scored INTEGER NOT NULL,
            goals_conceded INTEGER NOT NULL,
            goals_difference INTEGER NOT NULL,
            form TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (season, league_match, team)
        );
        "#
        ));
    }
    conn.execute_batch(&ddl).context("create sqlite schema")?;
    Ok(())
}

/// Upserts results rows; returns how many were written.
pub fn insert_results(conn: &mut Connection, rows: &[ResultRow]) -> Result<usize> {
    let tx = conn.transaction().context("begin results transaction")?;
    for row in rows {
        upsert_result(&tx, row)?;
    }
    tx.commit().context("commit results transaction")?;
    info!(rows = rows.len(), "results stored");
    Ok(rows.len())
}

/// Resolves raw fixtures to the first-leg naming and stores them as results.
pub fn insert_fixtures(
    conn: &mut Connection,
    fixtures: &[Fixture],
    flip: &RoundFlip,
) -> Result<usize> {
    let rows: Vec<ResultRow> = fixtures.iter().map(|f| flip.resolve(f)).collect();
    insert_results(conn, &rows)
}

fn upsert_result(tx: &Transaction<'_>, row: &ResultRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO results (season, league_match, home_role, team_1, team_2, outcome)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(season, league_match, team_1, team_2) DO UPDATE SET
            home_role = excluded.home_role,
            outcome = excluded.outcome
        "#,
        params![
            row.season,
            row.league_match,
            row.home_role,
            row.team_1,
            row.team_2,
            row.outcome
        ],
    )
    .with_context(|| {
        format!(
            "upsert result {} {} {} vs {}",
            row.season, row.league_match, row.team_1, row.team_2
        )
    })?;
    Ok(())
}

pub fn insert_snapshots(
    conn: &mut Connection,
    scope: Scope,
    rows: &[RankingSnapshot],
) -> Result<usize> {
    let sql = format!(
        r#"
        INSERT INTO {} (
            season, league_match, team, rank_position, matches_played,
            wins, draws, losses, goals_scored, goals_conceded, goals_difference, form
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(season, league_match, team) DO UPDATE SET
            rank_position = excluded.rank_position,
            matches_played = excluded.matches_played,
            wins = excluded.wins,
            draws = excluded.draws,
            losses = excluded.losses,
            goals_scored = excluded.goals_scored,
            goals_conceded = excluded.goals_conceded,
            goals_difference = excluded.goals_difference,
            form = excluded.form
        "#,
        scope.table_name()
    );
    let tx = conn.transaction().context("begin ranking transaction")?;
    {
        let mut stmt = tx.prepare(&sql).context("prepare ranking upsert")?;
        for s in rows {
            stmt.execute(params![
                s.season,
                s.league_match,
                s.team,
                s.rank_position,
                s.matches_played,
                s.wins,
                s.draws,
                s.losses,
                s.goals_scored,
                s.goals_conceded,
                s.goals_difference,
                s.form
            ])
            .with_context(|| {
                format!(
                    "upsert {scope} snapshot {} {} {}",
                    s.season, s.league_match, s.team
                )
            })?;
        }
    }
    tx.commit().context("commit ranking transaction")?;
    info!(%scope, rows = rows.len(), "ranking snapshots stored");
    Ok(rows.len())
}

pub fn load_results(conn: &Connection) -> Result<Vec<ResultRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT season, league_match, home_role, team_1, team_2, outcome
            FROM results
            ORDER BY season ASC, league_match ASC, team_1 ASC
            "#,
        )
        .context("prepare load results query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ResultRow {
                season: row.get(0)?,
                league_match: row.get(1)?,
                home_role: row.get(2)?,
                team_1: row.get(3)?,
                team_2: row.get(4)?,
                outcome: row.get(5)?,
            })
        })
        .context("query load results")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode result row")?);
    }
    Ok(out)
}

pub fn load_snapshots(conn: &Connection, scope: Scope) -> Result<Vec<RankingSnapshot>> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT
                season, league_match, team, rank_position, matches_played,
                wins, draws, losses, goals_scored, goals_conceded, goals_difference, form
            FROM {}
            ORDER BY season ASC, league_match ASC, team ASC
            "#,
            scope.table_name()
        ))
        .with_context(|| format!("prepare load {scope} ranking query"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RankingSnapshot {
                season: row.get(0)?,
                league_match: row.get(1)?,
                team: row.get(2)?,
                rank_position: row.get(3)?,
                matches_played: row.get(4)?,
                wins: row.get(5)?,
                draws: row.get(6)?,
                losses: row.get(7)?,
                goals_scored: row.get(8)?,
                goals_conceded: row.get(9)?,
                goals_difference: row.get(10)?,
                form: row.get(11)?,
            })
        })
        .with_context(|| format!("query load {scope} ranking"))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode ranking row")?);
    }
    Ok(out)
}

pub fn load_inputs(conn: &Connection) -> Result<Inputs> {
    Ok(Inputs {
        results: load_results(conn)?,
        general: load_snapshots(conn, Scope::General)?,
        home: load_snapshots(conn, Scope::Home)?,
        away: load_snapshots(conn, Scope::Away)?,
    })
}
