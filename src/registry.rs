//! Advocates, clients, cases and the join rows that relate them.

use chrono::{NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Advocate, Case, Client, NewAdvocate, NewAdvocateCase, NewAdvocateClient, NewCase, NewClient,
};
use crate::schema::{advocate_cases, advocate_clients, advocates, cases, clients};
use crate::validation::{
    normalize_email, optional_text, required_text, ADDRESS_MAX_CHARS, CASE_TYPE_MAX_CHARS,
    CONTACT_NUMBER_MAX_CHARS, DESCRIPTION_MAX_CHARS, NAME_MAX_CHARS,
};

#[derive(Debug, Clone)]
pub struct CaseRegistration {
    pub name: String,
    pub case_type: String,
    pub client_id: Uuid,
    pub advocate_id: Uuid,
    pub description: Option<String>,
    pub filing_date: Option<NaiveDateTime>,
}

pub fn register_advocate(conn: &mut PgConnection, name: &str, email: &str) -> AppResult<Uuid> {
    let new_advocate = NewAdvocate {
        id: Uuid::new_v4(),
        name: required_text("name", name, NAME_MAX_CHARS)?,
        email: normalize_email(email)?,
    };

    let result = conn.transaction(|conn| {
        diesel::insert_into(advocates::table)
            .values(&new_advocate)
            .execute(conn)
    });

    match result {
        Ok(_) => {
            info!(advocate_id = %new_advocate.id, "advocate registered");
            Ok(new_advocate.id)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
            AppError::conflict("an advocate with this email already exists"),
        ),
        Err(err) => Err(AppError::from(err)),
    }
}

pub fn register_client(
    conn: &mut PgConnection,
    name: &str,
    contact_number: &str,
    address: &str,
) -> AppResult<Uuid> {
    let new_client = NewClient {
        id: Uuid::new_v4(),
        name: required_text("name", name, NAME_MAX_CHARS)?,
        contact_number: required_text(
            "contact_number",
            contact_number,
            CONTACT_NUMBER_MAX_CHARS,
        )?,
        address: required_text("address", address, ADDRESS_MAX_CHARS)?,
    };

    conn.transaction(|conn| {
        diesel::insert_into(clients::table)
            .values(&new_client)
            .execute(conn)
    })?;

    info!(client_id = %new_client.id, "client registered");
    Ok(new_client.id)
}

/// Creates the case, links it to the registering advocate and records the
/// advocate's relationship with the client, all in one transaction.
pub fn register_case(conn: &mut PgConnection, registration: CaseRegistration) -> AppResult<Uuid> {
    let new_case = NewCase {
        id: Uuid::new_v4(),
        name: required_text("name", &registration.name, NAME_MAX_CHARS)?,
        case_type: required_text("case_type", &registration.case_type, CASE_TYPE_MAX_CHARS)?,
        description: optional_text(
            "description",
            registration.description.as_deref(),
            DESCRIPTION_MAX_CHARS,
        )?,
        filing_date: registration
            .filing_date
            .unwrap_or_else(|| Utc::now().naive_utc()),
        client_id: registration.client_id,
    };
    let advocate_id = registration.advocate_id;

    conn.transaction::<_, AppError, _>(|conn| {
        if !advocate_exists(conn, advocate_id)? {
            return Err(AppError::not_found("Advocate not found"));
        }
        if !client_exists(conn, new_case.client_id)? {
            return Err(AppError::not_found("Client not found"));
        }

        diesel::insert_into(cases::table)
            .values(&new_case)
            .execute(conn)?;

        diesel::insert_into(advocate_cases::table)
            .values(&NewAdvocateCase {
                advocate_id,
                case_id: new_case.id,
            })
            .execute(conn)?;

        diesel::insert_into(advocate_clients::table)
            .values(&NewAdvocateClient {
                advocate_id,
                client_id: new_case.client_id,
            })
            .on_conflict_do_nothing()
            .execute(conn)?;

        Ok(())
    })?;

    info!(
        case_id = %new_case.id,
        advocate_id = %advocate_id,
        client_id = %new_case.client_id,
        "case registered"
    );
    Ok(new_case.id)
}

pub fn advocate_exists(conn: &mut PgConnection, advocate_id: Uuid) -> AppResult<bool> {
    Ok(
        diesel::select(exists(advocates::table.filter(advocates::id.eq(advocate_id))))
            .get_result(conn)?,
    )
}

pub fn client_exists(conn: &mut PgConnection, client_id: Uuid) -> AppResult<bool> {
    Ok(
        diesel::select(exists(clients::table.filter(clients::id.eq(client_id))))
            .get_result(conn)?,
    )
}

pub fn find_advocate(conn: &mut PgConnection, advocate_id: Uuid) -> AppResult<Advocate> {
    advocates::table
        .find(advocate_id)
        .select(Advocate::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Advocate not found"))
}

pub fn find_client(conn: &mut PgConnection, client_id: Uuid) -> AppResult<Client> {
    clients::table
        .find(client_id)
        .select(Client::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Client not found"))
}

pub fn find_case(conn: &mut PgConnection, case_id: Uuid) -> AppResult<Case> {
    cases::table
        .find(case_id)
        .select(Case::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Case not found"))
}

/// Membership test used as the upload permission gate.
pub fn is_advocate_on_case(
    conn: &mut PgConnection,
    advocate_id: Uuid,
    case_id: Uuid,
) -> AppResult<bool> {
    Ok(diesel::select(exists(
        advocate_cases::table
            .filter(advocate_cases::advocate_id.eq(advocate_id))
            .filter(advocate_cases::case_id.eq(case_id)),
    ))
    .get_result(conn)?)
}

pub fn list_cases_for_advocate(conn: &mut PgConnection, advocate_id: Uuid) -> AppResult<Vec<Case>> {
    Ok(advocate_cases::table
        .inner_join(cases::table)
        .filter(advocate_cases::advocate_id.eq(advocate_id))
        .order(cases::filing_date.desc())
        .select(Case::as_select())
        .load(conn)?)
}

pub fn list_advocates_for_case(conn: &mut PgConnection, case_id: Uuid) -> AppResult<Vec<Uuid>> {
    Ok(advocate_cases::table
        .filter(advocate_cases::case_id.eq(case_id))
        .order(advocate_cases::linked_at.asc())
        .select(advocate_cases::advocate_id)
        .load(conn)?)
}
