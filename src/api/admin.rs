use chrono::Utc;
use log::{info, warn};
use mongodb::{
    bson::{doc, Bson},
    options::FindOptions,
    Client,
};
use rocket::{
    futures::{StreamExt, TryStreamExt},
    http::CookieJar,
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::{AdminCredentials, AdminDescription, PasswordUpdate},
        auth::AuthToken,
        response::Message,
        stats::{ActiveElection, DashboardStats, VoterStats},
        voter::{ProfileUpdate, VoterSummary},
    },
    common::{election::ElectionStatus, password::PasswordHash},
    db::{
        admin::{Admin, NewAdmin},
        candidate::Candidate,
        election::Election,
        voter::Voter,
    },
    ledger,
    mongodb::{is_duplicate_key_error, Coll, Id, IdParam},
};
use crate::Config;

use super::common::{created, ok, resolve_votes, ApiResult, Created};
use super::voter::apply_update;

pub fn routes() -> Vec<Route> {
    routes![
        create_admin,
        login,
        update_password,
        get_users,
        update_user,
        delete_user,
        admin_stats,
        dashboard_stats,
        active_elections,
        voting_progress,
    ]
}

#[post("/admin/register", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    new_admins: Coll<NewAdmin>,
    admins: Coll<Admin>,
) -> Created<AdminDescription> {
    let admin: NewAdmin = new_admin.0.try_into()?;
    match new_admins.insert_one(&admin, None).await {
        Ok(_) => {}
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::bad_request("Admin already exists"))
        }
        Err(err) => return Err(err.into()),
    }
    info!("Created admin '{}'", admin.username);

    let admin = admins
        .find_one(doc! {"username": &admin.username}, None)
        .await?
        .ok_or_else(|| Error::not_found("Admin"))?;
    created(admin.into())
}

#[post("/admin/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> ApiResult<AdminDescription> {
    credentials.require_fields()?;

    let admin = admins
        .find_one(doc! {"username": &credentials.username}, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    ok(admin.into())
}

/// Change an admin's password. Knowing the current password is enough; no session is needed.
#[put("/admin/update-password", data = "<update>", format = "json")]
async fn update_password(update: Json<PasswordUpdate>, admins: Coll<Admin>) -> ApiResult<Message> {
    update.validate()?;

    let admin = admins
        .find_one(doc! {"username": &update.username}, None)
        .await?
        .ok_or_else(|| Error::not_found("Admin"))?;
    if !admin.verify_password(&update.current_password) {
        warn!("Rejected password change for admin '{}'", admin.username);
        return Err(Error::unauthorized("Current password is incorrect"));
    }

    let hash = PasswordHash::new(&update.new_password)?;
    admins
        .update_one(
            admin.id.as_doc(),
            doc! {"$set": {"passwordHash": hash}},
            None,
        )
        .await?;
    info!("Password changed for admin '{}'", admin.username);

    ok(Message::new("Password updated successfully"))
}

/// Every registered voter, with the votes they have cast.
#[get("/admin/users")]
async fn get_users(
    _token: AuthToken<Admin>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<Vec<VoterSummary>> {
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let all: Vec<Voter> = voters.find(None, options).await?.try_collect().await?;

    let mut summaries = Vec::with_capacity(all.len());
    for voter in all {
        let votes = resolve_votes(&voter.votes, &elections, &candidates).await?;
        summaries.push(VoterSummary::new(voter, votes));
    }
    ok(summaries)
}

#[put("/admin/users/<voter_id>", data = "<update>", format = "json")]
async fn update_user(
    _token: AuthToken<Admin>,
    voter_id: IdParam,
    update: Json<ProfileUpdate>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<VoterSummary> {
    let voter = apply_update(voter_id?, &update, &voters).await?;
    info!("Admin updated voter '{}'", voter.username);

    let votes = resolve_votes(&voter.votes, &elections, &candidates).await?;
    ok(VoterSummary::new(voter, votes))
}

/// Delete a voter, taking back every vote they cast.
#[delete("/admin/users/<voter_id>")]
async fn delete_user(
    _token: AuthToken<Admin>,
    voter_id: IdParam,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
) -> ApiResult<Message> {
    let voter = remove_voter(voter_id?, &voters, &elections, &candidates, db_client).await?;
    info!(
        "Deleted voter '{}' and withdrew {} votes",
        voter.username,
        voter.votes.len()
    );
    ok(Message::new("Voter deleted successfully"))
}

/// Remove a voter and their votes from the tallies, returning the removed voter.
async fn remove_voter(
    voter_id: Id,
    voters: &Coll<Voter>,
    elections: &Coll<Election>,
    candidates: &Coll<Candidate>,
    db_client: &Client,
) -> Result<Voter> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let voter = voters
        .find_one_with_session(voter_id.as_doc(), None, &mut session)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;

    for vote in &voter.votes {
        let counted = doc! {
            "_id": vote.candidate_id,
            "electionId": vote.election_id,
            "votes": {"$gt": 0},
        };
        let result = candidates
            .update_one_with_session(counted, doc! {"$inc": {"votes": -1}}, None, &mut session)
            .await?;
        // A deleted candidate's votes have already left the election total.
        if result.modified_count == 0 {
            continue;
        }
        elections
            .update_one_with_session(
                doc! {"_id": vote.election_id, "totalVotes": {"$gt": 0}},
                doc! {"$inc": {"totalVotes": -1}},
                None,
                &mut session,
            )
            .await?;
    }

    voters
        .delete_one_with_session(voter_id.as_doc(), None, &mut session)
        .await?;
    ledger::commit(&mut session).await?;
    Ok(voter)
}

#[get("/admin/stats")]
async fn admin_stats(
    _token: AuthToken<Admin>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
) -> ApiResult<VoterStats> {
    ok(voter_stats(&voters, &elections).await?)
}

#[get("/dashboard/voting-progress")]
async fn voting_progress(
    _token: AuthToken<Admin>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
) -> ApiResult<VoterStats> {
    ok(voter_stats(&voters, &elections).await?)
}

async fn voter_stats(voters: &Coll<Voter>, elections: &Coll<Election>) -> Result<VoterStats> {
    let total_users = voters.count_documents(None, None).await?;
    let voted_users = voters
        .count_documents(doc! {"votes.0": {"$exists": true}}, None)
        .await?;
    let active_elections = elections
        .count_documents(ElectionStatus::active_filter(Utc::now()), None)
        .await?;
    Ok(VoterStats::new(total_users, voted_users, active_elections))
}

#[get("/dashboard/stats")]
async fn dashboard_stats(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<DashboardStats> {
    let active_ids: Vec<Bson> = elections
        .find(ElectionStatus::active_filter(Utc::now()), None)
        .await?
        .map_ok(|election| Bson::from(election.id))
        .try_collect()
        .await?;
    let registered_candidates = candidates
        .count_documents(doc! {"electionId": {"$in": active_ids.clone()}}, None)
        .await?;

    let pipeline = [doc! {"$group": {"_id": Bson::Null, "total": {"$sum": "$totalVotes"}}}];
    let total_votes = match elections.aggregate(pipeline, None).await?.next().await {
        Some(group) => match group?.get("total") {
            Some(Bson::Int32(total)) => u64::try_from(*total).unwrap_or_default(),
            Some(Bson::Int64(total)) => u64::try_from(*total).unwrap_or_default(),
            _ => 0,
        },
        // No elections at all.
        None => 0,
    };

    ok(DashboardStats {
        active_elections: active_ids.len() as u64,
        registered_candidates,
        total_votes,
    })
}

/// Active elections, closing soonest first.
#[get("/dashboard/active-elections")]
async fn active_elections(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> ApiResult<Vec<ActiveElection>> {
    let options = FindOptions::builder().sort(doc! {"endDate": 1}).build();
    let active: Vec<Election> = elections
        .find(ElectionStatus::active_filter(Utc::now()), options)
        .await?
        .try_collect()
        .await?;

    let mut listed = Vec::with_capacity(active.len());
    for election in active {
        let candidate_count = candidates
            .count_documents(doc! {"electionId": election.id}, None)
            .await?;
        listed.push(ActiveElection::new(election, candidate_count));
    }
    ok(listed)
}
