use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Maps a fieldless enum onto a `Varchar` column using fixed lowercase names.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} `{}`", stringify!($name), other)),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                std::str::from_utf8(bytes.as_bytes())?
                    .parse()
                    .map_err(Into::into)
            }
        }
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Authority,
    SuperAuthority,
}

text_enum!(Role {
    Member => "member",
    Authority => "authority",
    SuperAuthority => "super_authority",
});

impl Role {
    /// Authorities and super-authorities review submissions.
    pub fn is_authority(&self) -> bool {
        matches!(self, Role::Authority | Role::SuperAuthority)
    }
}

/// Approval state shared by clubs, activities, enrollments and registrations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

text_enum!(Status {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl Status {
    /// Pending and approved records hold a slot or a name; rejected ones do not.
    pub fn is_active(&self) -> bool {
        !matches!(self, Status::Rejected)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PendingVerification,
    Paid,
}

text_enum!(PaymentStatus {
    Unpaid => "unpaid",
    PendingVerification => "pending_verification",
    Paid => "paid",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Preparation,
    Start,
    InProgress,
    End,
}

text_enum!(Phase {
    Preparation => "preparation",
    Start => "start",
    InProgress => "in_progress",
    End => "end",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StatusUpdate,
    JoinRequest,
    RegistrationRequest,
    FeedbackReply,
}

text_enum!(NotificationKind {
    StatusUpdate => "status_update",
    JoinRequest => "join_request",
    RegistrationRequest => "registration_request",
    FeedbackReply => "feedback_reply",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pending,
    Resolved,
}

text_enum!(FeedbackStatus {
    Pending => "pending",
    Resolved => "resolved",
});

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: i32,
    #[serde(rename = "userId")]
    pub token: String,
    pub name: String,
    pub class: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub token: String,
    pub name: String,
    pub class: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub intro: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub meet_time: Option<String>,
    pub duration: Option<String>,
    pub weeks: Option<i32>,
    pub capacity: Option<i32>,
    pub attachment: Option<String>,
    pub founder: String,
    pub status: Status,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = clubs)]
pub struct NewClub {
    pub name: String,
    pub intro: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub meet_time: Option<String>,
    pub duration: Option<String>,
    pub weeks: Option<i32>,
    pub capacity: Option<i32>,
    pub attachment: Option<String>,
    pub founder: String,
    pub status: Status,
}

/// Founder edits. Absent fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset, Deserialize)]
#[diesel(table_name = clubs)]
#[serde(rename_all = "camelCase")]
pub struct ClubEdit {
    pub name: Option<String>,
    pub intro: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub meet_time: Option<String>,
    pub duration: Option<String>,
    pub weeks: Option<i32>,
    pub capacity: Option<i32>,
    pub attachment: Option<String>,
}

impl ClubEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.intro.is_none()
            && self.content.is_none()
            && self.location.is_none()
            && self.meet_time.is_none()
            && self.duration.is_none()
            && self.weeks.is_none()
            && self.capacity.is_none()
            && self.attachment.is_none()
    }

    pub fn apply_to(self, club: &mut Club) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut club.name, self.name);
        set(&mut club.intro, self.intro.map(Some));
        set(&mut club.content, self.content.map(Some));
        set(&mut club.location, self.location.map(Some));
        set(&mut club.meet_time, self.meet_time.map(Some));
        set(&mut club.duration, self.duration.map(Some));
        set(&mut club.weeks, self.weeks.map(Some));
        set(&mut club.capacity, self.capacity.map(Some));
        set(&mut club.attachment, self.attachment.map(Some));
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i32,
    #[serde(rename = "userId")]
    pub user_token: String,
    pub club_id: i32,
    pub status: Status,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = enrollments)]
pub struct NewEnrollment {
    pub user_token: String,
    pub club_id: i32,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i32,
    pub name: String,
    pub capacity: Option<i32>,
    pub held_at: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub flow: Option<String>,
    pub requirements: Option<String>,
    pub attachment: Option<String>,
    pub organizer: String,
    pub status: Status,
    pub phase: Phase,
    pub phase_preparation: Option<String>,
    pub phase_start: Option<String>,
    pub phase_in_progress: Option<String>,
    pub phase_end: Option<String>,
    pub has_fee: bool,
    pub fee_amount: Option<String>,
    pub payment_qr_code: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activities)]
pub struct NewActivity {
    pub name: String,
    pub capacity: Option<i32>,
    pub held_at: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub flow: Option<String>,
    pub requirements: Option<String>,
    pub attachment: Option<String>,
    pub organizer: String,
    pub status: Status,
    pub phase: Phase,
    pub phase_preparation: Option<String>,
    pub phase_start: Option<String>,
    pub phase_in_progress: Option<String>,
    pub phase_end: Option<String>,
    pub has_fee: bool,
    pub fee_amount: Option<String>,
    pub payment_qr_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: i32,
    pub activity_id: i32,
    #[serde(rename = "userId")]
    pub user_token: String,
    pub name: String,
    pub class: String,
    pub contact: Option<String>,
    pub reason: Option<String>,
    pub status: Status,
    pub payment_status: PaymentStatus,
    pub payment_proof: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = registrations)]
pub struct NewRegistration {
    pub activity_id: i32,
    pub user_token: String,
    pub name: String,
    pub class: String,
    pub contact: Option<String>,
    pub reason: Option<String>,
    pub status: Status,
    pub payment_status: PaymentStatus,
    pub payment_proof: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    #[serde(rename = "userId")]
    pub user_token: String,
    pub kind: NotificationKind,
    pub related_id: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_token: String,
    pub kind: NotificationKind,
    pub related_id: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: i32,
    #[serde(rename = "authorId")]
    pub author: String,
    pub author_name: String,
    pub author_class: String,
    pub content: String,
    pub media: Vec<String>,
    pub status: FeedbackStatus,
    pub reply: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = feedback)]
pub struct NewFeedback {
    pub author: String,
    pub author_name: String,
    pub author_class: String,
    pub content: String,
    pub media: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_names_round_trip_through_text() {
        assert_eq!("super_authority".parse::<Role>(), Ok(Role::SuperAuthority));
        assert_eq!(Phase::InProgress.as_str(), "in_progress");
        assert_eq!(
            "pending_verification".parse::<PaymentStatus>(),
            Ok(PaymentStatus::PendingVerification)
        );
        assert!("archived".parse::<Status>().is_err());
    }

    #[test]
    fn serde_and_column_names_agree() {
        let json = serde_json::to_string(&PaymentStatus::PendingVerification).unwrap();
        assert_eq!(json, format!("\"{}\"", PaymentStatus::PendingVerification));
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Preparation < Phase::Start);
        assert!(Phase::InProgress < Phase::End);
        assert_eq!(Phase::default(), Phase::Preparation);
    }

    #[test]
    fn edits_only_touch_present_fields() {
        let mut club = Club {
            id: 1,
            name: "Chess".into(),
            intro: Some("old".into()),
            content: None,
            location: Some("Room 3".into()),
            meet_time: None,
            duration: None,
            weeks: None,
            capacity: Some(10),
            attachment: None,
            founder: "F0UNDER1".into(),
            status: Status::Approved,
            created_at: NaiveDateTime::from_timestamp_opt(0, 0).unwrap(),
        };
        let edit = ClubEdit {
            intro: Some("new".into()),
            capacity: Some(12),
            ..ClubEdit::default()
        };
        assert!(!edit.is_empty());
        edit.apply_to(&mut club);
        assert_eq!(club.intro.as_deref(), Some("new"));
        assert_eq!(club.capacity, Some(12));
        assert_eq!(club.location.as_deref(), Some("Room 3"));
        assert_eq!(club.name, "Chess");
    }
}
