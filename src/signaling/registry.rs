//! Room membership: admission, pairing notifications and eviction.

use std::collections::HashMap;

use tracing::debug;

use super::messages::ServerMessage;
use super::types::{MemberId, ROOM_CAPACITY, RoomId};

/// Result of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Seated alone, waiting for a second member
    Waiting,
    /// Seated next to `existing`, who arrived first
    Paired { existing: MemberId },
    /// Room already holds two members; nothing changed
    RoomFull,
}

/// A control message the registry wants delivered to one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub to: MemberId,
    pub message: ServerMessage,
}

impl Notice {
    fn new(to: MemberId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

#[derive(Debug, Default)]
struct Room {
    /// Arrival order
    members: Vec<MemberId>,
}

/// In-memory map of rooms. Not shared: the room actor owns the only instance.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat `member` in `room`, first evicting it from wherever it was.
    pub fn join(&mut self, member: MemberId, room: &RoomId) -> (JoinOutcome, Vec<Notice>) {
        let mut notices = self.leave(member);

        let seated = self.rooms.entry(room.clone()).or_default();
        if seated.members.len() >= ROOM_CAPACITY {
            notices.push(Notice::new(member, ServerMessage::RoomFull));
            debug!("Room {} full, rejected {}", room, member);
            return (JoinOutcome::RoomFull, notices);
        }
        seated.members.push(member);

        let outcome = match seated.members.iter().find(|id| **id != member) {
            Some(&existing) => {
                notices.push(Notice::new(member, ServerMessage::OtherUser(existing)));
                notices.push(Notice::new(existing, ServerMessage::UserJoined(member)));
                JoinOutcome::Paired { existing }
            }
            None => JoinOutcome::Waiting,
        };

        debug!("Room {}: {:?}", room, seated.members);
        (outcome, notices)
    }

    /// Remove `member` from every room it appears in. Calling this for a
    /// member that is nowhere is a no-op.
    pub fn leave(&mut self, member: MemberId) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut changed = false;

        self.rooms.retain(|room, seated| {
            let before = seated.members.len();
            seated.members.retain(|id| *id != member);
            if seated.members.len() != before {
                changed = true;
                if let Some(&remaining) = seated.members.first() {
                    notices.push(Notice::new(remaining, ServerMessage::UserLeft));
                }
            }
            if seated.members.is_empty() {
                debug!("Room {} removed (empty)", room);
                return false;
            }
            true
        });

        if changed {
            debug!("Rooms after cleanup: {}", self.rooms.len());
        }
        notices
    }

    pub fn members(&self, room: &RoomId) -> Option<&[MemberId]> {
        self.rooms.get(room).map(|r| r.members.as_slice())
    }

    pub fn room_of(&self, member: MemberId) -> Option<&RoomId> {
        self.rooms
            .iter()
            .find(|(_, r)| r.members.contains(&member))
            .map(|(id, _)| id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    fn seat_unchecked(&mut self, member: MemberId, room: &RoomId) {
        self.rooms.entry(room.clone()).or_default().members.push(member);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (MemberId, MemberId, MemberId) {
        (
            MemberId::try_from("m_000000000000000a").unwrap(),
            MemberId::try_from("m_000000000000000b").unwrap(),
            MemberId::try_from("m_000000000000000c").unwrap(),
        )
    }

    #[test]
    fn first_join_waits() {
        let (a, _, _) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        let (outcome, notices) = reg.join(a, &room);
        assert_eq!(outcome, JoinOutcome::Waiting);
        assert!(notices.is_empty());
        assert_eq!(reg.members(&room), Some(&[a][..]));
    }

    #[test]
    fn second_join_pairs_with_distinct_notices() {
        let (a, b, _) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        reg.join(a, &room);
        let (outcome, notices) = reg.join(b, &room);

        assert_eq!(outcome, JoinOutcome::Paired { existing: a });
        assert_eq!(
            notices,
            vec![
                Notice::new(b, ServerMessage::OtherUser(a)),
                Notice::new(a, ServerMessage::UserJoined(b)),
            ]
        );
        assert_eq!(reg.members(&room), Some(&[a, b][..]));
    }

    #[test]
    fn third_join_is_rejected_without_mutation() {
        let (a, b, c) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        reg.join(a, &room);
        reg.join(b, &room);
        let (outcome, notices) = reg.join(c, &room);

        assert_eq!(outcome, JoinOutcome::RoomFull);
        assert_eq!(notices, vec![Notice::new(c, ServerMessage::RoomFull)]);
        assert_eq!(reg.members(&room), Some(&[a, b][..]));
        assert_eq!(reg.room_of(c), None);
    }

    #[test]
    fn leave_notifies_remaining_member_once() {
        let (a, b, _) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        reg.join(a, &room);
        reg.join(b, &room);

        let notices = reg.leave(a);
        assert_eq!(notices, vec![Notice::new(b, ServerMessage::UserLeft)]);
        assert_eq!(reg.members(&room), Some(&[b][..]));

        let notices = reg.leave(b);
        assert!(notices.is_empty());
        assert_eq!(reg.members(&room), None);
        assert_eq!(reg.room_count(), 0);
    }

    #[test]
    fn leave_is_idempotent() {
        let (a, b, _) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        reg.join(a, &room);
        reg.join(b, &room);

        assert_eq!(reg.leave(a).len(), 1);
        assert!(reg.leave(a).is_empty());
        assert_eq!(reg.members(&room), Some(&[b][..]));
    }

    #[test]
    fn join_moves_member_between_rooms() {
        let (a, b, _) = ids();
        let first = RoomId::from("first");
        let second = RoomId::from("second");
        let mut reg = RoomRegistry::new();

        reg.join(a, &first);
        reg.join(b, &first);

        let (outcome, notices) = reg.join(a, &second);
        assert_eq!(outcome, JoinOutcome::Waiting);
        assert_eq!(notices, vec![Notice::new(b, ServerMessage::UserLeft)]);
        assert_eq!(reg.room_of(a), Some(&second));
        assert_eq!(reg.members(&first), Some(&[b][..]));
    }

    #[test]
    fn leave_clears_stale_entries_in_several_rooms() {
        let (a, b, _) = ids();
        let first = RoomId::from("first");
        let second = RoomId::from("second");
        let mut reg = RoomRegistry::new();

        reg.seat_unchecked(a, &first);
        reg.seat_unchecked(b, &first);
        reg.seat_unchecked(a, &second);

        let notices = reg.leave(a);
        assert_eq!(notices, vec![Notice::new(b, ServerMessage::UserLeft)]);
        assert_eq!(reg.members(&second), None);
        assert_eq!(reg.room_of(a), None);
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn rejoining_same_room_reseats_at_the_back() {
        let (a, b, _) = ids();
        let room = RoomId::from("R");
        let mut reg = RoomRegistry::new();

        reg.join(a, &room);
        reg.join(b, &room);
        let (outcome, notices) = reg.join(a, &room);

        assert_eq!(outcome, JoinOutcome::Paired { existing: b });
        assert_eq!(
            notices,
            vec![
                Notice::new(b, ServerMessage::UserLeft),
                Notice::new(a, ServerMessage::OtherUser(b)),
                Notice::new(b, ServerMessage::UserJoined(a)),
            ]
        );
    }

    #[test]
    fn capacity_never_exceeded() {
        let room = RoomId::from("busy");
        let mut reg = RoomRegistry::new();
        let members: Vec<MemberId> = (0..10).map(|_| MemberId::generate()).collect();

        for (i, m) in members.iter().enumerate() {
            reg.join(*m, &room);
            if i % 3 == 0 {
                reg.leave(members[i / 2]);
            }
            let size = reg.members(&room).map_or(0, |m| m.len());
            assert!(size <= ROOM_CAPACITY);
        }
    }
}
