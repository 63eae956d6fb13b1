use chrono::Utc;
use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    identity::Did,
    model::{
        api::{
            admin::AdminCredentials,
            auth::AuthToken,
            campaign::{CampaignDescription, CampaignSpec, CampaignSummary, CandidateSpec},
            voter::VoterDescription,
        },
        db::{
            admin::{Admin, NewAdmin},
            campaign::{Campaign, Candidate, NewCampaign},
            voter::Voter,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        create_campaign,
        campaigns_admin,
        campaigns_non_admin,
        get_campaign,
        add_candidate,
        campaign_voters,
        verify_voter,
    ]
}

#[get("/admins")]
async fn get_admins(_token: AuthToken<Admin>, admins: Coll<Admin>) -> Result<Json<Vec<String>>> {
    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    let admin_names = admin_list
        .into_iter()
        .map(|admin| admin.admin.username)
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    admins: Coll<NewAdmin>,
) -> Result<()> {
    // Check username uniqueness.
    let filter = doc! {
        "username": &new_admin.username,
    };
    let existing = admins.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::bad_request(format!(
            "Admin username already in use: {}",
            new_admin.username
        )));
    }

    // Create and insert the admin.
    let admin: NewAdmin = new_admin
        .0
        .try_into()
        .map_err(|_| Error::bad_request("Illegal admin credentials"))?;
    admins.insert_one(admin, None).await?;
    Ok(())
}

#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    _token: AuthToken<Admin>,
    username: String,
    admins: Coll<Admin>,
) -> Result<()> {
    // Prevent deleting the last admin.
    let count = admins.count_documents(None, None).await?;
    if count == 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    let filter = doc! {
        "username": &username,
    };
    let result = admins.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Admin {}", username)))
    } else {
        Ok(())
    }
}

#[post("/campaigns", data = "<spec>", format = "json")]
async fn create_campaign(
    _token: AuthToken<Admin>,
    spec: Json<CampaignSpec>,
    new_campaigns: Coll<NewCampaign>,
    campaigns: Coll<Campaign>,
) -> Result<Json<CampaignDescription>> {
    let spec = spec.0;
    if spec.end_time < spec.start_time {
        return Err(Error::bad_request("Campaign cannot end before it starts"));
    }

    let campaign: NewCampaign = spec.into();
    let new_id: Id = new_campaigns
        .insert_one(&campaign, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();
    let created = campaigns.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(created.into()))
}

#[get("/campaigns", rank = 1)]
async fn campaigns_admin(
    _token: AuthToken<Admin>,
    campaigns: Coll<Campaign>,
) -> Result<Json<Vec<CampaignSummary>>> {
    let all: Vec<Campaign> = campaigns.find(None, None).await?.try_collect().await?;
    Ok(Json(all.into_iter().map(Into::into).collect()))
}

/// Non-admins (the registration page) only see campaigns that are still
/// open or upcoming.
#[get("/campaigns", rank = 2)]
async fn campaigns_non_admin(campaigns: Coll<Campaign>) -> Result<Json<Vec<CampaignSummary>>> {
    let filter = doc! {
        "end_time": { "$gte": mongodb::bson::DateTime::from_chrono(Utc::now()) },
    };
    let open: Vec<Campaign> = campaigns.find(filter, None).await?.try_collect().await?;
    Ok(Json(open.into_iter().map(Into::into).collect()))
}

#[get("/campaigns/<campaign_id>")]
async fn get_campaign(
    campaign_id: Id,
    campaigns: Coll<Campaign>,
) -> Result<Json<CampaignDescription>> {
    let campaign = campaigns
        .find_one(campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign with ID '{campaign_id}'")))?;
    Ok(Json(campaign.into()))
}

#[post("/campaigns/<campaign_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    spec: Json<CandidateSpec>,
    campaigns: Coll<Campaign>,
) -> Result<Json<Candidate>> {
    let candidate = spec.0.into_candidate();
    let update = doc! {
        "$push": {
            "candidates": mongodb::bson::to_bson(&candidate)
                .expect("Candidate serialization does not fail"),
        }
    };
    let result = campaigns
        .update_one(campaign_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!(
            "Campaign with ID '{campaign_id}'"
        )));
    }
    Ok(Json(candidate))
}

#[get("/campaigns/<campaign_id>/voters")]
async fn campaign_voters(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    voters: Coll<Voter>,
) -> Result<Json<Vec<VoterDescription>>> {
    let filter = doc! {
        "campaign_id": campaign_id,
    };
    let registered: Vec<Voter> = voters.find(filter, None).await?.try_collect().await?;
    Ok(Json(registered.into_iter().map(Into::into).collect()))
}

/// Promote a registration to verified. This is the only path into the
/// `Verified` state, and it is an explicit admin action.
#[post("/voters/<did>/verify")]
async fn verify_voter(_token: AuthToken<Admin>, did: Did, voters: Coll<Voter>) -> Result<()> {
    let filter = doc! {
        "did": did.as_str(),
    };
    let update = doc! {
        "$set": { "verified": true },
    };
    let result = voters.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        Err(Error::not_found(format!("Voter with DID '{did}'")))
    } else {
        Ok(())
    }
}
