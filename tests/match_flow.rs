//! End-to-end match flow through the public API, driven by wire JSON.

use serde_json::Value;
use tokio::sync::broadcast;

use tile_skirmish::game::SessionTransition;
use tile_skirmish::network::{ClientMessage, ConnectionId, Envelope, MatchSession};
use tile_skirmish::world::block::{MARKER_TEAM_START_BLUE, MARKER_TEAM_START_RED};
use tile_skirmish::world::schema::{MapLayout, MapType};
use tile_skirmish::{ServerConfig, Team};

fn arena() -> MapLayout {
    let mut layout = MapLayout::empty(MapType::Dirt);
    for y in 3..6 {
        layout.place(3, y, MARKER_TEAM_START_RED);
        layout.place(20, y, MARKER_TEAM_START_BLUE);
    }
    layout
}

fn new_match(seed: u64) -> (MatchSession, broadcast::Receiver<Envelope>) {
    let (tx, rx) = broadcast::channel(4096);
    let session = MatchSession::new(&ServerConfig::default(), arena(), seed, tx).unwrap();
    (session, rx)
}

fn send(session: &mut MatchSession, connection: ConnectionId, json: &str, now_ms: u64) {
    let message = ClientMessage::from_json(json).unwrap();
    session.handle_message(connection, message, now_ms);
}

/// Wire JSON of every message addressed to `connection`.
fn received(rx: &mut broadcast::Receiver<Envelope>, connection: ConnectionId) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if envelope.is_for(connection) {
            let text = envelope.message.to_json().unwrap();
            out.push(serde_json::from_str(&text).unwrap());
        }
    }
    out
}

fn actions(messages: &[Value]) -> Vec<String> {
    messages.iter().map(|m| m["action"].as_str().unwrap().to_string()).collect()
}

#[test]
fn test_round_cycle_over_the_wire() {
    let (mut session, mut rx) = new_match(21);

    session.connect(1);
    send(&mut session, 1, r#"{"action":"getLevelState"}"#, 0);
    let first = received(&mut rx, 1);
    assert_eq!(actions(&first), vec!["levelState"]);
    assert_eq!(first[0]["data"]["mapWidth"], 56);
    assert_eq!(first[0]["data"]["projectiles"].as_array().unwrap().len(), 100);

    send(
        &mut session,
        1,
        r#"{"action":"registerPlayer","data":{"name":"ann","weapon":"uzi","team":"red"}}"#,
        0,
    );
    let joined = received(&mut rx, 1);
    assert_eq!(actions(&joined), vec!["registerSuccess", "playerConnected", "spawnActor"]);
    let human = joined[0]["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(joined[2]["data"]["weaponKey"], "uzi");
    assert_eq!(joined[2]["data"]["x"], 96.0);

    send(&mut session, 1, r#"{"action":"addBot","data":{"team":"blue","difficulty":"novice"}}"#, 0);
    let bot = received(&mut rx, 1);
    assert_eq!(actions(&bot), vec!["playerConnected", "spawnActor"]);
    assert_eq!(bot[0]["data"]["isBot"], true);
    assert_eq!(bot[1]["data"]["team"], "blue");

    session.start();
    assert_eq!(session.poll_session(), Some(SessionTransition::Started));
    session.tick();
    let play = received(&mut rx, 1);
    assert_eq!(actions(&play), vec!["gameSessionState", "tickUpdate"]);
    assert_eq!(play[0]["data"], "play");
    assert!(play[1]["data"]["actors"].get(human.as_str()).is_some());

    // The only red player leaves: blue wins.
    session.disconnect(1);
    assert_eq!(session.game().alive(Team::Red), 0);
    assert_eq!(session.poll_session(), Some(SessionTransition::Finished { win_team: Team::Blue }));
    assert!(!session.scheduler().is_running());

    session.connect(2);
    let finish = received(&mut rx, 2);
    assert_eq!(actions(&finish), vec!["playerDisconnected", "gameSessionState", "sessionScore"]);
    assert_eq!(finish[1]["data"], "finish");
    assert_eq!(finish[2]["data"]["winTeam"], "blue");

    session.restart().unwrap();
    assert_eq!(session.round(), 1);
    let lobby = received(&mut rx, 2);
    assert_eq!(actions(&lobby), vec!["levelState", "gameSessionState"]);
    assert_eq!(lobby[1]["data"], "lobby");
    assert_eq!(lobby[0]["data"]["actors"].as_object().unwrap().len(), 1);

    // Blue alone cannot start a round.
    assert_eq!(session.poll_session(), None);
}

#[test]
fn test_bot_match_is_deterministic() {
    fn run(seed: u64) -> ([u8; 32], Vec<String>) {
        let (mut session, mut rx) = new_match(seed);
        session.connect(1);
        for team in ["red", "blue"] {
            for difficulty in ["expert", "elite"] {
                let json = format!(
                    r#"{{"action":"addBot","data":{{"team":"{}","difficulty":"{}"}}}}"#,
                    team, difficulty
                );
                send(&mut session, 1, &json, 0);
            }
        }

        session.start();
        let mut deltas = Vec::new();
        for tick in 0..400 {
            if tick % 66 == 0 {
                session.poll_session();
            }
            session.tick();
            while let Ok(envelope) = rx.try_recv() {
                if envelope.message.action() == "tickUpdate" {
                    deltas.push(envelope.message.to_json().unwrap());
                }
            }
        }
        (session.world().compute_hash(), deltas)
    }

    let (hash_a, deltas_a) = run(5);
    let (hash_b, deltas_b) = run(5);
    assert_eq!(hash_a, hash_b);
    assert_eq!(deltas_a.len(), deltas_b.len());
    assert_eq!(deltas_a, deltas_b);
}

#[test]
fn test_binary_controller_frames_drive_actor() {
    let (mut session, mut rx) = new_match(8);
    session.connect(1);
    send(
        &mut session,
        1,
        r#"{"action":"registerPlayer","data":{"name":"bo","weapon":"pistol","team":"blue"}}"#,
        0,
    );
    let id = session.player_of(1).unwrap();
    received(&mut rx, 1);

    let frame = tile_skirmish::network::encode_controller(&tile_skirmish::Controller {
        is_firing: true,
        ..Default::default()
    })
    .unwrap();
    let controller = tile_skirmish::network::decode_controller(&frame).unwrap();
    session.handle_message(1, ClientMessage::UpdateActorController(controller), 100);

    assert!(session.world().actor(&id).unwrap().controller.is_firing);
}

#[test]
fn test_kill_finishes_round_and_restart_revives() {
    let (mut session, mut rx) = new_match(13);
    for (connection, team) in [(1, "red"), (2, "blue")] {
        session.connect(connection);
        let json = format!(
            r#"{{"action":"registerPlayer","data":{{"name":"p{}","weapon":"pistol","team":"{}"}}}}"#,
            connection, team
        );
        send(&mut session, connection, &json, 0);
    }
    let red = session.player_of(1).unwrap();
    let blue = session.player_of(2).unwrap();

    session.start();
    assert_eq!(session.poll_session(), Some(SessionTransition::Started));

    let world = session.world_mut();
    world.actor_mut(&red).unwrap().position = tile_skirmish::FixedVec2::from_ints(100, 100);
    world.actor_mut(&blue).unwrap().position = tile_skirmish::FixedVec2::from_ints(200, 100);
    world.actor_mut(&blue).unwrap().health = 1;

    send(
        &mut session,
        1,
        r#"{"action":"updateActorController","data":{"isFiring":true,"facingX":216,"facingY":100}}"#,
        0,
    );
    for _ in 0..10 {
        session.tick();
    }
    assert!(session.world().actor(&blue).unwrap().is_dead);
    received(&mut rx, 0);

    assert_eq!(session.poll_session(), Some(SessionTransition::Finished { win_team: Team::Red }));
    let finish = received(&mut rx, 2);
    assert_eq!(actions(&finish), vec!["gameSessionState", "sessionScore"]);
    assert_eq!(finish[1]["data"]["scores"][red.0.to_string()], 1);

    session.restart().unwrap();
    assert!(!session.world().actor(&blue).unwrap().is_dead);
    assert_eq!(session.game().alive(Team::Blue), 1);
    assert_eq!(session.poll_session(), Some(SessionTransition::Started));
}
