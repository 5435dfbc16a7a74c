use std::collections::HashMap;

use adaptable_topk::{ChangeObserver, TopKSelector};

/// Mirrors the retained set into a secondary index, the way a cache would
/// keep its hot set in sync without polling the selector.
#[derive(Default)]
struct HotSet {
    members: HashMap<String, f64>,
    // Every transition into or out of the top k: adds, updates, deletes,
    // promotions and demotions.
    entered: usize,
    left: usize,
}

impl ChangeObserver<String, f64> for HotSet {
    fn on_change(&mut self, player: &String, old: Option<&f64>, new: Option<&f64>) {
        match (old, new) {
            (None, Some(score)) => {
                self.members.insert(player.clone(), *score);
                self.entered += 1;
            }
            (Some(_), None) => {
                self.members.remove(player);
                self.left += 1;
            }
            _ => {}
        }
    }
}

fn main() {
    let mut board = TopKSelector::new(3).with_observer(HotSet::default());

    let rounds = [
        ("ana", 120.0),
        ("bo", 95.5),
        ("cy", 130.0),
        ("dee", 88.0),
        ("bo", 140.0),
        ("eli", 131.0),
        ("ana", 20.0),
    ];
    for (player, score) in rounds {
        board.add_or_update(player.to_string(), score).unwrap();
    }
    board.delete(&"eli".to_string());

    println!("Leaderboard:");
    for (rank, (player, score)) in board.top().into_iter().enumerate() {
        println!("{:>2}. {:<5} {:>7.1}", rank + 1, player, score);
    }
    println!("tracked players: {}", board.len());

    let hot = board.observer();
    println!(
        "hot set: {} members, {} entries and {} exits",
        hot.members.len(),
        hot.entered,
        hot.left
    );
    if let Some(cutoff) = board.threshold() {
        println!("score needed to enter the board: > {}", cutoff);
    }
}
